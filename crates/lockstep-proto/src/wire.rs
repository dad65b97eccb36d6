//! Wire encoding for frames.
//!
//! Frames travel as CBOR maps:
//!
//! ```text
//! { frame_id: u64, commands: [ { entity_id, command_type, payload: bytes }, ... ] }
//! ```
//!
//! A [`FrameBatch`] wraps several consecutive frames for bulk transfer. Both
//! encoders enforce a size limit and both decoders reject the sentinel id, so
//! anything that decodes successfully is structurally valid.

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::{
    Frame, FrameId,
    errors::{ProtocolError, Result},
};

/// Largest encoded single frame accepted on either side (1 MiB).
pub const MAX_ENCODED_FRAME_SIZE: usize = 1024 * 1024;

/// Largest encoded frame batch accepted on either side (16 MiB).
pub const MAX_ENCODED_BATCH_SIZE: usize = 16 * 1024 * 1024;

/// Encode a frame into `dst`.
///
/// # Errors
///
/// - `ProtocolError::ReservedFrameId` if the frame carries the sentinel id
/// - `ProtocolError::FrameTooLarge` if the encoding exceeds
///   [`MAX_ENCODED_FRAME_SIZE`]
/// - `ProtocolError::Encode` if CBOR serialization fails
pub fn encode_frame(frame: &Frame, dst: &mut impl BufMut) -> Result<()> {
    if frame.frame_id.is_sentinel() {
        return Err(ProtocolError::ReservedFrameId);
    }

    let buf = to_cbor(frame, MAX_ENCODED_FRAME_SIZE)?;
    dst.put_slice(&buf);
    Ok(())
}

/// Decode a frame from CBOR bytes.
///
/// # Errors
///
/// - `ProtocolError::FrameTooLarge` if `bytes` exceeds [`MAX_ENCODED_FRAME_SIZE`]
/// - `ProtocolError::Decode` for malformed CBOR, missing fields or bytes
///   left over after the frame
/// - `ProtocolError::ReservedFrameId` if the decoded id is the sentinel
pub fn decode_frame(bytes: &[u8]) -> Result<Frame> {
    let frame: Frame = from_cbor(bytes, MAX_ENCODED_FRAME_SIZE)?;

    if frame.frame_id.is_sentinel() {
        return Err(ProtocolError::ReservedFrameId);
    }

    Ok(frame)
}

/// Ordered run of consecutive frames.
///
/// # Invariants
///
/// - No frame carries the sentinel id
/// - Each frame id is exactly one greater than the previous one
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameBatch {
    /// Frames in increasing id order
    pub frames: Vec<Frame>,
}

impl FrameBatch {
    /// Build a batch, validating ordering.
    pub fn new(frames: Vec<Frame>) -> Result<Self> {
        let batch = Self { frames };
        batch.validate()?;
        Ok(batch)
    }

    /// Id of the first frame, if any.
    pub fn first_id(&self) -> Option<FrameId> {
        self.frames.first().map(|f| f.frame_id)
    }

    /// Id of the last frame, if any.
    pub fn last_id(&self) -> Option<FrameId> {
        self.frames.last().map(|f| f.frame_id)
    }

    /// Number of frames in the batch.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Encode the batch into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        self.validate()?;
        let buf = to_cbor(self, MAX_ENCODED_BATCH_SIZE)?;
        dst.put_slice(&buf);
        Ok(())
    }

    /// Decode and validate a batch.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let batch: Self = from_cbor(bytes, MAX_ENCODED_BATCH_SIZE)?;
        batch.validate()?;
        Ok(batch)
    }

    fn validate(&self) -> Result<()> {
        let mut expected: Option<FrameId> = None;

        for frame in &self.frames {
            if frame.frame_id.is_sentinel() {
                return Err(ProtocolError::ReservedFrameId);
            }

            if let Some(expected) = expected {
                if frame.frame_id != expected {
                    return Err(ProtocolError::NonConsecutiveBatch {
                        expected: expected.get(),
                        got: frame.frame_id.get(),
                    });
                }
            }

            expected = frame.frame_id.checked_next();
        }

        Ok(())
    }
}

fn to_cbor<T: Serialize>(value: &T, max: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if buf.len() > max {
        return Err(ProtocolError::FrameTooLarge { size: buf.len(), max });
    }

    Ok(buf)
}

fn from_cbor<T: for<'de> Deserialize<'de>>(bytes: &[u8], max: usize) -> Result<T> {
    if bytes.len() > max {
        return Err(ProtocolError::FrameTooLarge { size: bytes.len(), max });
    }

    let mut reader = bytes;
    let value =
        ciborium::de::from_reader(&mut reader).map_err(|e| ProtocolError::Decode(e.to_string()))?;

    if !reader.is_empty() {
        return Err(ProtocolError::Decode(format!("{} trailing bytes", reader.len())));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::Command;

    fn frame(id: u64) -> Frame {
        Frame::new(FrameId::new(id), vec![Command::new(7, 1, Bytes::from_static(b"x"))])
    }

    #[test]
    fn frame_round_trip() {
        let original = frame(4);

        let mut buf = Vec::new();
        encode_frame(&original, &mut buf).expect("encode failed");
        let decoded = decode_frame(&buf).expect("decode failed");

        assert_eq!(decoded, original);
    }

    #[test]
    fn sentinel_frame_is_not_encodable() {
        let mut buf = Vec::new();
        let result = encode_frame(&Frame::empty(FrameId::SENTINEL), &mut buf);

        assert_eq!(result, Err(ProtocolError::ReservedFrameId));
        assert!(buf.is_empty());
    }

    #[test]
    fn sentinel_frame_is_not_decodable() {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&Frame::empty(FrameId::SENTINEL), &mut buf)
            .expect("raw encode failed");

        assert_eq!(decode_frame(&buf), Err(ProtocolError::ReservedFrameId));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let big = Command::new(1, 1, vec![0u8; MAX_ENCODED_FRAME_SIZE]);
        let mut buf = Vec::new();

        let result = encode_frame(&Frame::new(FrameId::FIRST, vec![big]), &mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(decode_frame(&[0xff, 0x00, 0x13]), Err(ProtocolError::Decode(_))));
        assert!(matches!(decode_frame(&[]), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn batch_requires_consecutive_ids() {
        assert!(FrameBatch::new(vec![frame(1), frame(2), frame(3)]).is_ok());

        let result = FrameBatch::new(vec![frame(1), frame(3)]);
        assert_eq!(result, Err(ProtocolError::NonConsecutiveBatch { expected: 2, got: 3 }));
    }

    #[test]
    fn batch_round_trip_preserves_order() {
        let batch = FrameBatch::new(vec![frame(5), frame(6)]).expect("valid batch");

        let mut buf = Vec::new();
        batch.encode(&mut buf).expect("encode failed");
        let decoded = FrameBatch::decode(&buf).expect("decode failed");

        assert_eq!(decoded.first_id(), Some(FrameId::new(5)));
        assert_eq!(decoded.last_id(), Some(FrameId::new(6)));
        assert_eq!(decoded, batch);
    }

    #[test]
    fn empty_batch_is_valid() {
        let batch = FrameBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.first_id(), None);

        let mut buf = Vec::new();
        batch.encode(&mut buf).expect("encode failed");
        assert_eq!(FrameBatch::decode(&buf).expect("decode failed").len(), 0);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Vec::new();
        encode_frame(&frame(2), &mut buf).expect("encode failed");
        buf.extend_from_slice(&[0x00, 0xff]);

        assert!(matches!(decode_frame(&buf), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn second_frame_after_first_is_rejected() {
        let mut buf = Vec::new();
        encode_frame(&frame(2), &mut buf).expect("encode failed");
        encode_frame(&frame(3), &mut buf).expect("encode failed");

        assert!(matches!(decode_frame(&buf), Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn batch_with_trailing_bytes_is_rejected() {
        let mut buf = Vec::new();
        FrameBatch::new(vec![frame(1)]).expect("valid batch").encode(&mut buf).expect("encode failed");
        buf.push(0x00);

        assert!(matches!(FrameBatch::decode(&buf), Err(ProtocolError::Decode(_))));
    }
}
