//! Executes session actions against connections.
//!
//! Delivery is fire-and-forget: each `Deliver` is attempted once, failures
//! are logged and counted, and nothing is retried. The participant's cursor
//! has already moved past the frame by the time the action runs.

use lockstep_core::{Connection, SessionAction};
use lockstep_proto::FrameId;

/// Outcome of executing one tick's actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Frame sealed by the tick, if any
    pub sealed: Option<FrameId>,
    /// Successful deliveries
    pub delivered: usize,
    /// Failed deliveries
    pub failed: usize,
}

/// Run `actions` for `room_id`.
pub fn execute_actions<C: Connection>(room_id: u64, actions: Vec<SessionAction<C>>) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    for action in actions {
        match action {
            SessionAction::FrameSealed { frame_id, command_count } => {
                tracing::trace!(room_id, %frame_id, command_count, "executing tick");
                stats.sealed = Some(frame_id);
            },
            SessionAction::Deliver { owner_id, connection, frame } => {
                match connection.deliver(&frame) {
                    Ok(()) => stats.delivered += 1,
                    Err(e) => {
                        tracing::warn!(
                            room_id,
                            owner_id,
                            frame_id = %frame.frame_id,
                            error = %e,
                            "frame delivery failed"
                        );
                        stats.failed += 1;
                    },
                }
            },
        }
    }

    stats
}
