//! Frame codec - length-prefixed typed frames for the companion link
//!
//! Every message on the wire is one frame:
//!
//! ```text
//! +----------------+----------+------------------+
//! | length (4B BE) | type(1B) | payload (N bytes)|
//! +----------------+----------+------------------+
//! length = 1 + N
//! ```
//!
//! This crate has no knowledge of sockets. [`frame`] holds the pure
//! encode/decode functions; [`codec`] wraps them in a `tokio_util` codec that
//! accumulates bytes across arbitrary read boundaries.
//!
//! # Example
//!
//! ```
//! use echoesphere_codec::{decode, encode, FrameType};
//!
//! let bytes = encode(FrameType::Text, b"hello").unwrap();
//! assert_eq!(&bytes[..4], &6u32.to_be_bytes());
//!
//! let prefix: [u8; 4] = bytes[..4].try_into().unwrap();
//! let frame = decode(prefix, &bytes[4..]).unwrap();
//! assert_eq!(frame.frame_type, FrameType::Text);
//! assert_eq!(&frame.payload[..], b"hello");
//! ```

pub mod codec;
pub mod error;
pub mod frame;

pub use echoesphere_types as types;
pub use echoesphere_types::FrameType;

pub use codec::FrameCodec;
pub use error::CodecError;
pub use frame::{
    decode, decode_length, encode, encode_header, encode_with_limit, Frame, RawFrame,
};
