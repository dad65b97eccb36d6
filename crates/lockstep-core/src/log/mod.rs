//! Append-only frame log.
//!
//! [`FrameStore`] is the storage abstraction: a synchronous, append-only map
//! from [`FrameId`] to [`Frame`]. [`FrameLog`] wraps a store with the sealing
//! contract (ids start at 1 and increase by exactly one) and an explicit
//! [`RetentionPolicy`].
//!
//! The log is owned by a single session, so the trait takes `&mut self` for
//! writes. Serializing access across threads is the runtime's job.

mod error;
mod memory;

use std::num::NonZeroUsize;

pub use error::StorageError;
use lockstep_proto::{Frame, FrameId};
pub use memory::MemoryFrameStore;

/// Storage backend for sealed frames.
///
/// # Invariants
///
/// - `append` accepts only `latest_id() + 1`, anything else is `Conflict`
/// - `latest_id()` never decreases, even after eviction
/// - `get` on the sentinel or an id above `latest_id()` is `NotFound`
pub trait FrameStore: Send + 'static {
    /// Append a frame at the end of the log.
    ///
    /// # Invariants
    ///
    /// - Pre: `frame.frame_id == latest_id() + 1`
    /// - Post: `latest_id() == frame.frame_id`
    fn append(&mut self, frame: Frame) -> Result<(), StorageError>;

    /// Fetch a sealed frame.
    fn get(&self, frame_id: FrameId) -> Result<Frame, StorageError>;

    /// Highest sealed id, or the sentinel if nothing was sealed.
    fn latest_id(&self) -> FrameId;

    /// Oldest id still held. `None` if the store holds no frames.
    fn oldest_id(&self) -> Option<FrameId>;

    /// Drop every frame with id `<= frame_id`. Returns how many were dropped.
    fn evict_through(&mut self, frame_id: FrameId) -> usize;

    /// Number of frames currently held.
    fn len(&self) -> usize;

    /// Whether the store holds no frames.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How many sealed frames the log keeps.
///
/// Participants only ever need frames newer than their cursor, and every
/// cursor is advanced to the newest frame on each tick, so `KeepLast(1)` is
/// enough for delivery. Larger windows serve diagnostics and late readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep every frame for the lifetime of the session
    #[default]
    Unbounded,
    /// Keep only the newest `n` frames
    KeepLast(NonZeroUsize),
}

/// Sealed frame log with sequencing and retention.
#[derive(Debug)]
pub struct FrameLog<S: FrameStore = MemoryFrameStore> {
    store: S,
    retention: RetentionPolicy,
}

impl FrameLog<MemoryFrameStore> {
    /// Empty in-memory log.
    pub fn in_memory(retention: RetentionPolicy) -> Self {
        Self::new(MemoryFrameStore::new(), retention)
    }
}

impl<S: FrameStore> FrameLog<S> {
    /// Wrap an existing store.
    pub fn new(store: S, retention: RetentionPolicy) -> Self {
        Self { store, retention }
    }

    /// Store `frame` under `frame_id`.
    ///
    /// # Errors
    ///
    /// `StorageError::Conflict` if `frame_id` is not exactly `latest_id() + 1`
    /// or does not match `frame.frame_id`. Either is a caller bug.
    pub fn seal(&mut self, frame_id: FrameId, frame: Frame) -> Result<(), StorageError> {
        let expected = self.next_id();

        if frame_id != frame.frame_id || Some(frame_id) != expected {
            return Err(StorageError::Conflict {
                expected: expected.unwrap_or(FrameId::SENTINEL),
                got: frame_id,
            });
        }

        self.store.append(frame)?;

        debug_assert_eq!(self.store.latest_id(), frame_id);
        tracing::trace!(%frame_id, retained = self.store.len(), "frame sealed");

        Ok(())
    }

    /// Fetch a sealed frame.
    pub fn get(&self, frame_id: FrameId) -> Result<Frame, StorageError> {
        self.store.get(frame_id)
    }

    /// Highest sealed id (sentinel if none).
    pub fn latest_id(&self) -> FrameId {
        self.store.latest_id()
    }

    /// Id the next seal must use. `None` once the id space is exhausted.
    pub fn next_id(&self) -> Option<FrameId> {
        self.store.latest_id().checked_next()
    }

    /// Oldest frame still retained.
    pub fn oldest_retained(&self) -> Option<FrameId> {
        self.store.oldest_id()
    }

    /// Frames with ids in `(after, through]`, in increasing order.
    ///
    /// This is the catch-up read: `after` is a participant's cursor and
    /// `through` the newest sealed frame.
    pub fn range(&self, after: FrameId, through: FrameId) -> Result<Vec<Frame>, StorageError> {
        let mut frames = Vec::new();
        let mut next = after.checked_next();

        while let Some(frame_id) = next {
            if frame_id > through {
                break;
            }
            frames.push(self.store.get(frame_id)?);
            next = frame_id.checked_next();
        }

        Ok(frames)
    }

    /// Number of retained frames.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no frames are retained.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Active retention policy.
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Evict frames beyond the retention window. Returns how many were dropped.
    pub fn enforce_retention(&mut self) -> usize {
        let RetentionPolicy::KeepLast(keep) = self.retention else {
            return 0;
        };

        let excess = self.store.len().saturating_sub(keep.get());
        if excess == 0 {
            return 0;
        }

        let Some(oldest) = self.store.oldest_id() else {
            return 0;
        };

        let through = FrameId::new(oldest.get() + excess as u64 - 1);
        let evicted = self.store.evict_through(through);

        tracing::debug!(%through, evicted, retained = self.store.len(), "frames evicted");

        evicted
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
