//! Shared types module - identifiers, wire constants and game events
//!
//! This crate defines the plain data types used by both the frame codec and the
//! network adapter. It has no dependencies, so game-side code can name sessions
//! and build events without pulling in the async stack.
//!
//! # Wire Constants
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `DEFAULT_PORT` | 65432 | Port the companion link listens on |
//! | `LENGTH_PREFIX_LEN` | 4 | Big-endian length field |
//! | `HEADER_LEN` | 5 | Length field plus type byte |
//! | `MAX_WIRE_LENGTH` | `i32::MAX` | Largest length value a peer may send |
//! | `DEFAULT_MAX_FRAME_LEN` | 64 MiB | Default cap applied by the stream decoder |
//!
//! # Examples
//!
//! ```
//! use echoesphere_types::{FrameType, GameEvent, HitNote};
//!
//! assert_eq!(FrameType::try_from(0x01), Ok(FrameType::Image));
//! assert_eq!(GameEvent::HitBlock(HitNote::Red).to_string(), "HitBlockColor: Red");
//! ```

use std::fmt;
use std::net::SocketAddr;

/// Default listening port for the companion link.
pub const DEFAULT_PORT: u16 = 65432;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Size of the length prefix plus the type byte.
pub const HEADER_LEN: usize = LENGTH_PREFIX_LEN + 1;

/// Largest value the length field may carry.
///
/// Peers on the other side read the field as a signed 32-bit integer, so
/// anything with the sign bit set is never valid.
pub const MAX_WIRE_LENGTH: usize = i32::MAX as usize;

/// Default cap on a single inbound frame (type byte + payload).
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Frame type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// UTF-8 text payload.
    Text = 0x00,
    /// Encoded image payload (JPEG from the renderer).
    Image = 0x01,
}

impl FrameType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FrameType::Text => "text",
            FrameType::Image => "image",
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(FrameType::Text),
            0x01 => Ok(FrameType::Image),
            other => Err(other),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one accepted connection.
///
/// Derived from the peer's `ip:port` at accept time and kept for the lifetime
/// of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_peer(addr: SocketAddr) -> Self {
        Self::new(addr.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<SocketAddr> for SessionId {
    fn from(addr: SocketAddr) -> Self {
        Self::from_peer(addr)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Color of a hit block in the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitNote {
    Red,
    Blue,
    Green,
    Orange,
}

impl HitNote {
    pub const ALL: [HitNote; 4] = [HitNote::Red, HitNote::Blue, HitNote::Green, HitNote::Orange];

    pub fn as_str(self) -> &'static str {
        match self {
            HitNote::Red => "Red",
            HitNote::Blue => "Blue",
            HitNote::Green => "Green",
            HitNote::Orange => "Orange",
        }
    }

    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|note| note.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for HitNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Game-side notification sent to peers as a text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The player touched a hit block: `HitBlockColor: <note>`.
    HitBlock(HitNote),
    /// Session greeting: `Init: <text>`.
    Init(String),
}

impl GameEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::HitBlock(_) => "HitBlockColor",
            GameEvent::Init(_) => "Init",
        }
    }
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::HitBlock(note) => write!(f, "{}: {}", self.kind(), note),
            GameEvent::Init(text) => write!(f, "{}: {}", self.kind(), text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type_bytes() {
        assert_eq!(FrameType::Text.as_u8(), 0x00);
        assert_eq!(FrameType::Image.as_u8(), 0x01);
        assert_eq!(FrameType::try_from(0x00), Ok(FrameType::Text));
        assert_eq!(FrameType::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn test_session_id_from_peer() {
        let addr: SocketAddr = "192.168.1.20:50123".parse().unwrap();
        let id = SessionId::from_peer(addr);
        assert_eq!(id.as_str(), "192.168.1.20:50123");
        assert_eq!(SessionId::from(addr), id);
        assert_eq!(SessionId::new("192.168.1.20:50123"), id);
        assert_eq!(id.to_string(), "192.168.1.20:50123");
    }

    #[test]
    fn test_hit_note_parse() {
        assert_eq!(HitNote::from_str("orange"), Some(HitNote::Orange));
        assert_eq!(HitNote::from_str("RED"), Some(HitNote::Red));
        assert_eq!(HitNote::from_str("purple"), None);
    }

    #[test]
    fn test_game_event_text() {
        assert_eq!(
            GameEvent::HitBlock(HitNote::Blue).to_string(),
            "HitBlockColor: Blue"
        );
        assert_eq!(
            GameEvent::Init("Raspberry Pi 10.0.0.2:65432".to_string()).to_string(),
            "Init: Raspberry Pi 10.0.0.2:65432"
        );
    }

    #[test]
    fn test_wire_constants() {
        assert_eq!(HEADER_LEN, 5);
        assert_eq!(MAX_WIRE_LENGTH, 0x7FFF_FFFF);
        assert!(DEFAULT_MAX_FRAME_LEN < MAX_WIRE_LENGTH);
    }
}
