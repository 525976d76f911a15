//! Stream codec for use with `tokio_util::codec::{FramedRead, FramedWrite}`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;
use crate::frame::{decode_length, encode_header, Frame, RawFrame};
use crate::types::{DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_LEN, MAX_WIRE_LENGTH};

/// Length-prefixed frame codec.
///
/// Decoding yields [`RawFrame`]s; the type byte is validated by the caller so an
/// unknown type can be skipped without ending the stream. A declared length
/// above `max_frame_len` is fatal, since nothing after it can be trusted.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            max_frame_len: max_frame_len.clamp(1, MAX_WIRE_LENGTH),
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = RawFrame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>, CodecError> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_LEN];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX_LEN]);
        let len = decode_length(prefix)?;
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }

        let total = LENGTH_PREFIX_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        let mut body = src.split_to(len);
        let type_byte = body.get_u8();
        Ok(Some(RawFrame {
            type_byte,
            payload: body.freeze(),
        }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>, CodecError> {
        // A peer that hangs up mid-frame has closed the connection; the partial
        // bytes are left in the buffer for the caller to report.
        self.decode(src)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let header = encode_header(frame.frame_type, frame.payload.len())?;
        dst.reserve(header.len() + frame.payload.len());
        dst.put_slice(&header);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}
