//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding protocol messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// CBOR serialization failed
    #[error("encode error: {0}")]
    Encode(String),

    /// CBOR deserialization failed (malformed or truncated input)
    #[error("decode error: {0}")]
    Decode(String),

    /// Encoded message exceeds the protocol limit
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Size of the offending message
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Frame id 0 is the empty sentinel and never goes on the wire
    #[error("frame id 0 is reserved")]
    ReservedFrameId,

    /// Frames in a batch must have strictly consecutive ids
    #[error("non-consecutive frame batch: expected id {expected}, got {got}")]
    NonConsecutiveBatch {
        /// Id that should have followed the previous frame
        expected: u64,
        /// Id actually found
        got: u64,
    },
}
