//! Error types for the companion link.

use std::fmt;

use thiserror::Error;

use crate::codec::CodecError;
use crate::types::SessionId;

/// Errors surfaced by link operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The listening socket could not be bound. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing a frame to one session failed. Isolated to that session.
    #[error("send to {session_id} failed: {source}")]
    SendFailed {
        session_id: SessionId,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown client {0}")]
    UnknownClient(SessionId),

    /// Payload rejected by the codec before any byte was written.
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("screenshot capture failed: {0:#}")]
    CaptureFailed(anyhow::Error),

    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl LinkError {
    pub(crate) fn send_failed(session_id: &SessionId, source: std::io::Error) -> Self {
        LinkError::SendFailed {
            session_id: session_id.clone(),
            source,
        }
    }
}

/// Why a session's receive loop ended.
#[derive(Debug)]
pub enum CloseReason {
    /// Peer closed the connection (EOF, possibly mid-frame).
    PeerClosed,
    /// The session or the whole server was shut down locally.
    Shutdown,
    /// Read failed at the socket.
    Io(std::io::Error),
    /// The peer sent a length field that cannot be trusted.
    Protocol(CodecError),
}

impl CloseReason {
    /// Whether this is an ordinary end of a connection rather than a failure.
    pub fn is_normal(&self) -> bool {
        matches!(self, CloseReason::PeerClosed | CloseReason::Shutdown)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::PeerClosed => f.write_str("peer closed connection"),
            CloseReason::Shutdown => f.write_str("shutdown"),
            CloseReason::Io(e) => write!(f, "i/o error: {e}"),
            CloseReason::Protocol(e) => write!(f, "protocol error: {e}"),
        }
    }
}
