//! Frame values and the pure encode/decode functions.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;
use crate::types::{FrameType, HEADER_LEN, LENGTH_PREFIX_LEN, MAX_WIRE_LENGTH};

/// One typed unit of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(frame_type: FrameType, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            payload: payload.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::new(FrameType::Text, text)
    }

    pub fn image(bytes: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Image, bytes)
    }

    /// Value carried by the length field for this frame.
    pub fn length_field(&self) -> usize {
        1 + self.payload.len()
    }

    /// Total bytes on the wire, including the length field.
    pub fn wire_len(&self) -> usize {
        LENGTH_PREFIX_LEN + self.length_field()
    }
}

/// A length-delimited frame whose type byte has not been checked yet.
///
/// The stream decoder yields these so that an unknown type byte only costs the
/// frame, not the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub type_byte: u8,
    pub payload: Bytes,
}

impl RawFrame {
    pub fn into_frame(self) -> Result<Frame, CodecError> {
        let frame_type =
            FrameType::try_from(self.type_byte).map_err(CodecError::UnknownMessageType)?;
        Ok(Frame {
            frame_type,
            payload: self.payload,
        })
    }
}

impl TryFrom<RawFrame> for Frame {
    type Error = CodecError;

    fn try_from(raw: RawFrame) -> Result<Self, Self::Error> {
        raw.into_frame()
    }
}

/// Length field value for a payload, bounded by `max_frame_len`.
fn checked_length(payload_len: usize, max_frame_len: usize) -> Result<u32, CodecError> {
    let max = max_frame_len.min(MAX_WIRE_LENGTH);
    match payload_len.checked_add(1) {
        Some(len) if len <= max => Ok(len as u32),
        _ => Err(CodecError::PayloadTooLarge {
            len: payload_len,
            max: max.saturating_sub(1),
        }),
    }
}

fn header_bytes(frame_type: FrameType, length: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..LENGTH_PREFIX_LEN].copy_from_slice(&length.to_be_bytes());
    header[LENGTH_PREFIX_LEN] = frame_type.as_u8();
    header
}

/// Encode the 5-byte header (length field + type byte) for a payload size.
pub fn encode_header(
    frame_type: FrameType,
    payload_len: usize,
) -> Result<[u8; HEADER_LEN], CodecError> {
    let length = checked_length(payload_len, MAX_WIRE_LENGTH)?;
    Ok(header_bytes(frame_type, length))
}

/// Encode a frame, rejecting payloads whose frame would exceed `max_frame_len`.
pub fn encode_with_limit(
    frame_type: FrameType,
    payload: &[u8],
    max_frame_len: usize,
) -> Result<Bytes, CodecError> {
    let length = checked_length(payload.len(), max_frame_len)?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_slice(&header_bytes(frame_type, length));
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Encode `[len BE][type][payload]` with `len = 1 + payload.len()`.
pub fn encode(frame_type: FrameType, payload: &[u8]) -> Result<Bytes, CodecError> {
    encode_with_limit(frame_type, payload, MAX_WIRE_LENGTH)
}

/// Interpret a 4-byte big-endian length field.
///
/// Zero and values with the sign bit set are rejected.
pub fn decode_length(prefix: [u8; LENGTH_PREFIX_LEN]) -> Result<usize, CodecError> {
    let raw = u32::from_be_bytes(prefix);
    if raw == 0 || raw as usize > MAX_WIRE_LENGTH {
        return Err(CodecError::InvalidLength(raw));
    }
    Ok(raw as usize)
}

/// Decode a frame from its length field and exactly that many following bytes.
pub fn decode(length_bytes: [u8; LENGTH_PREFIX_LEN], body: &[u8]) -> Result<Frame, CodecError> {
    let declared = decode_length(length_bytes)?;
    if body.len() != declared {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }

    RawFrame {
        type_byte: body[0],
        payload: Bytes::copy_from_slice(&body[1..]),
    }
    .into_frame()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(bytes: &[u8]) -> ([u8; 4], &[u8]) {
        let prefix: [u8; 4] = bytes[..4].try_into().unwrap();
        (prefix, &bytes[4..])
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(FrameType::Text, b"HitBlockColor: Red").unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 19]);
        assert_eq!(bytes[4], 0x00);
        assert_eq!(&bytes[5..], b"HitBlockColor: Red");
    }

    #[test]
    fn test_encode_empty_payload() {
        let bytes = encode(FrameType::Image, &[]).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 1, 0x01]);
    }

    #[test]
    fn test_round_trip_preserves_type_and_payload() {
        let cases: [(FrameType, &[u8]); 4] = [
            (FrameType::Text, &b""[..]),
            (FrameType::Text, "héllo wörld".as_bytes()),
            (FrameType::Image, &[0xFF, 0xD8, 0xFF, 0xE0, 0x00][..]),
            (FrameType::Image, &[0u8; 4096][..]),
        ];
        for (frame_type, payload) in cases {
            let bytes = encode(frame_type, payload).unwrap();
            let (prefix, body) = split(&bytes);
            let frame = decode(prefix, body).unwrap();
            assert_eq!(frame.frame_type, frame_type);
            assert_eq!(&frame.payload[..], payload);
        }
    }

    #[test]
    fn test_length_field_is_one_plus_payload() {
        for n in [0usize, 1, 255, 256, 70_000] {
            let payload = vec![7u8; n];
            let bytes = encode(FrameType::Image, &payload).unwrap();
            let (prefix, _) = split(&bytes);
            assert_eq!(decode_length(prefix).unwrap(), n + 1);
            assert_eq!(Frame::image(payload).length_field(), n + 1);
        }
    }

    #[test]
    fn test_header_matches_full_encoding() {
        let payload = b"screenshot";
        let header = encode_header(FrameType::Image, payload.len()).unwrap();
        let full = encode(FrameType::Image, payload).unwrap();
        assert_eq!(&full[..HEADER_LEN], &header);
    }

    #[test]
    fn test_payload_too_large_with_limit() {
        let err = encode_with_limit(FrameType::Text, &[0u8; 16], 16).unwrap_err();
        match err {
            CodecError::PayloadTooLarge { len, max } => {
                assert_eq!(len, 16);
                assert_eq!(max, 15);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(encode_with_limit(FrameType::Text, &[0u8; 15], 16).is_ok());
    }

    #[test]
    fn test_header_rejects_lengths_past_i32() {
        assert!(matches!(
            encode_header(FrameType::Image, MAX_WIRE_LENGTH),
            Err(CodecError::PayloadTooLarge { .. })
        ));
        assert!(encode_header(FrameType::Image, MAX_WIRE_LENGTH - 1).is_ok());
        assert!(matches!(
            encode_header(FrameType::Image, usize::MAX),
            Err(CodecError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = decode([0, 0, 0, 3], &[0xFF, 1, 2]).unwrap_err();
        assert!(matches!(err, CodecError::UnknownMessageType(0xFF)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_invalid_lengths() {
        assert!(matches!(
            decode_length([0, 0, 0, 0]),
            Err(CodecError::InvalidLength(0))
        ));
        assert!(matches!(
            decode_length([0x80, 0, 0, 0]),
            Err(CodecError::InvalidLength(0x8000_0000))
        ));
        assert_eq!(decode_length([0x7F, 0xFF, 0xFF, 0xFF]).unwrap(), MAX_WIRE_LENGTH);
    }

    #[test]
    fn test_decode_length_mismatch() {
        let err = decode([0, 0, 0, 4], &[0x00, b'a']).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch {
                declared: 4,
                actual: 2
            }
        ));
        assert!(!err.is_recoverable());
    }
}
