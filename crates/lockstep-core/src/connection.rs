//! Outbound connection abstraction.

use lockstep_proto::Frame;

use crate::DeliveryError;

/// Handle used to push sealed frames to one participant.
///
/// Implementations wrap whatever transport the host uses. `deliver` is
/// called once per missed frame per tick and MUST NOT block: a slow or dead
/// peer has to fail fast (`Full` / `Closed`) rather than stall the tick
/// for everyone else.
pub trait Connection: Clone + Send + Sync + 'static {
    /// Queue one frame for this participant.
    fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError>;
}
