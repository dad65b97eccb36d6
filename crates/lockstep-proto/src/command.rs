//! Participant input commands.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// One participant's action for the frame currently being built.
///
/// The server never inspects `payload`; it is carried verbatim so every client
/// applies byte-identical input. Cloning is cheap (`Bytes` is reference
/// counted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Entity the command acts on
    pub entity_id: i32,
    /// Application-defined command discriminator
    pub command_type: u32,
    /// Opaque command arguments
    pub payload: Bytes,
}

impl Command {
    /// Create a command.
    pub fn new(entity_id: i32, command_type: u32, payload: impl Into<Bytes>) -> Self {
        Self { entity_id, command_type, payload: payload.into() }
    }
}
