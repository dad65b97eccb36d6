use lockstep_proto::FrameId;
use thiserror::Error;

/// Errors from frame log operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Frame was never sealed (or is the sentinel)
    #[error("frame {frame_id} not found")]
    NotFound {
        /// Requested frame
        frame_id: FrameId,
    },

    /// Frame was sealed but dropped by the retention policy
    #[error("frame {frame_id} evicted (oldest retained: {oldest})")]
    Evicted {
        /// Requested frame
        frame_id: FrameId,
        /// Oldest frame still in the log
        oldest: FrameId,
    },

    /// Seal out of sequence. Programming error in the caller.
    #[error("seal conflict: expected frame {expected}, got {got}")]
    Conflict {
        /// Next id the log would accept
        expected: FrameId,
        /// Id the caller tried to seal
        got: FrameId,
    },
}
