//! Session and delivery error types.

use lockstep_proto::FrameId;
use thiserror::Error;

use crate::log::StorageError;

/// Errors from [`FrameSyncSession`](crate::FrameSyncSession) operations.
///
/// Every variant except `Unauthorized` indicates a broken invariant. The
/// runtime treats them as fatal for the session and stops it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Frame log rejected a seal or could not serve a catch-up read
    #[error("frame log error: {0}")]
    Storage(#[from] StorageError),

    /// Caller tried to report on behalf of another participant
    ///
    /// Only returned under `UnauthorizedPolicy::Reject`; the default policy
    /// drops the command silently.
    #[error("caller {caller_id} may not report for owner {owner_id}")]
    Unauthorized {
        /// Identity the report channel belongs to
        owner_id: u64,
        /// Identity that actually made the call
        caller_id: u64,
    },

    /// No frame id left to assign
    #[error("frame id space exhausted after {0}")]
    FrameIdExhausted(FrameId),
}

impl SessionError {
    /// Whether the session can keep running after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Unauthorized { .. })
    }
}

/// Errors from pushing a frame to a participant's connection.
///
/// Delivery failures are logged by the executor and never retried; the
/// participant's cursor has already moved past the frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Peer is gone
    #[error("connection closed")]
    Closed,

    /// Outbound buffer is full (slow consumer)
    #[error("outbound buffer full")]
    Full,

    /// Transport-specific failure
    #[error("transport error: {0}")]
    Transport(String),
}
