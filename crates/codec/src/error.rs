use thiserror::Error;

/// Errors produced while framing or parsing frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Outbound payload does not fit the length field (or the configured cap).
    #[error("payload of {len} bytes exceeds the frame limit of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    /// Inbound length field exceeds the decoder's configured cap.
    #[error("declared frame length {len} exceeds the limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// Length field is zero or has the sign bit set.
    #[error("invalid frame length field {0:#010x}")]
    InvalidLength(u32),

    /// Body handed to `decode` does not match the length field.
    #[error("length field declares {declared} bytes but {actual} were supplied")]
    LengthMismatch { declared: usize, actual: usize },

    /// Type byte is not a known frame type. Recoverable: the frame is skipped.
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Whether the stream can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::UnknownMessageType(_))
    }
}
