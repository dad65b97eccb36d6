use std::collections::VecDeque;

use lockstep_proto::{Frame, FrameId};

use super::{FrameStore, StorageError};

/// In-memory frame store.
///
/// Frames live in a `VecDeque` in id order, so the id of any retained frame
/// maps to an index by subtracting the id at the front. Lookups, appends and
/// front eviction are all O(1).
#[derive(Debug, Default)]
pub struct MemoryFrameStore {
    /// Retained frames, oldest first
    frames: VecDeque<Frame>,
    /// Highest id ever appended (survives eviction)
    latest: FrameId,
}

impl MemoryFrameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn front_id(&self) -> Option<FrameId> {
        self.frames.front().map(|f| f.frame_id)
    }
}

impl FrameStore for MemoryFrameStore {
    fn append(&mut self, frame: Frame) -> Result<(), StorageError> {
        let expected = self.latest.checked_next().unwrap_or(FrameId::SENTINEL);

        if frame.frame_id != expected || frame.frame_id.is_sentinel() {
            return Err(StorageError::Conflict { expected, got: frame.frame_id });
        }

        self.latest = frame.frame_id;
        self.frames.push_back(frame);

        debug_assert_eq!(self.frames.back().map(|f| f.frame_id), Some(self.latest));

        Ok(())
    }

    fn get(&self, frame_id: FrameId) -> Result<Frame, StorageError> {
        if frame_id.is_sentinel() || frame_id > self.latest {
            return Err(StorageError::NotFound { frame_id });
        }

        let Some(oldest) = self.front_id() else {
            // Everything up to `latest` has been evicted
            return Err(StorageError::Evicted {
                frame_id,
                oldest: self.latest.checked_next().unwrap_or(self.latest),
            });
        };

        if frame_id < oldest {
            return Err(StorageError::Evicted { frame_id, oldest });
        }

        let index = (frame_id.get() - oldest.get()) as usize;
        let frame = self.frames.get(index).ok_or(StorageError::NotFound { frame_id })?;

        debug_assert_eq!(frame.frame_id, frame_id);

        Ok(frame.clone())
    }

    fn latest_id(&self) -> FrameId {
        self.latest
    }

    fn oldest_id(&self) -> Option<FrameId> {
        self.front_id()
    }

    fn evict_through(&mut self, frame_id: FrameId) -> usize {
        let mut evicted = 0;

        while self.front_id().is_some_and(|id| id <= frame_id) {
            self.frames.pop_front();
            evicted += 1;
        }

        evicted
    }

    fn len(&self) -> usize {
        self.frames.len()
    }
}
