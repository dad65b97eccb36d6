//! Sealed frames and frame identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Command;

/// Frame identity.
///
/// Ids are assigned by the server, start at 1 and increase by exactly one per
/// sealed frame. Id 0 ([`FrameId::SENTINEL`]) means "nothing sealed yet" and
/// is never stored or delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(u64);

impl FrameId {
    /// Reserved empty sentinel.
    pub const SENTINEL: Self = Self(0);

    /// First id ever sealed.
    pub const FIRST: Self = Self(1);

    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw id value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the reserved sentinel.
    pub const fn is_sentinel(self) -> bool {
        self.0 == 0
    }

    /// Id following this one. `None` on `u64` overflow.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl From<u64> for FrameId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<FrameId> for u64 {
    fn from(id: FrameId) -> Self {
        id.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Immutable, sequentially numbered batch of commands sealed at one tick.
///
/// # Invariants
///
/// - `frame_id` is never [`FrameId::SENTINEL`] for a frame in the log
/// - `commands` are in report order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame identity
    pub frame_id: FrameId,
    /// Commands in the order they were reported
    pub commands: Vec<Command>,
}

impl Frame {
    /// Create a frame.
    pub fn new(frame_id: FrameId, commands: Vec<Command>) -> Self {
        Self { frame_id, commands }
    }

    /// Frame with no commands.
    pub fn empty(frame_id: FrameId) -> Self {
        Self { frame_id, commands: Vec::new() }
    }

    /// Whether the frame carries no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Number of commands in the frame.
    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_zero() {
        assert!(FrameId::SENTINEL.is_sentinel());
        assert!(!FrameId::FIRST.is_sentinel());
        assert_eq!(FrameId::default(), FrameId::SENTINEL);
    }

    #[test]
    fn checked_next_increments_by_one() {
        assert_eq!(FrameId::SENTINEL.checked_next(), Some(FrameId::FIRST));
        assert_eq!(FrameId::new(41).checked_next(), Some(FrameId::new(42)));
        assert_eq!(FrameId::new(u64::MAX).checked_next(), None);
    }

    #[test]
    fn frame_ids_order_numerically() {
        assert!(FrameId::new(2) < FrameId::new(10));
        assert_eq!(FrameId::new(7).to_string(), "7");
    }

    #[test]
    fn empty_frame_has_no_commands() {
        let frame = Frame::empty(FrameId::new(3));
        assert!(frame.is_empty());
        assert_eq!(frame.len(), 0);
    }
}
