//! Room registry.
//!
//! Maps room id → session handle. Rooms must be explicitly created (no lazy
//! creation), and removing a room stops its session so no tick task outlives
//! the room.

use std::collections::HashMap;

use lockstep_core::Connection;

use crate::{RegistryError, ServerConfig, SessionHandle};

/// Sessions keyed by room id.
#[derive(Debug)]
pub struct SessionRegistry<C: Connection> {
    rooms: HashMap<u64, SessionHandle<C>>,
    config: ServerConfig,
}

impl<C: Connection> SessionRegistry<C> {
    /// Empty registry. New rooms use `config`.
    pub fn new(config: ServerConfig) -> Self {
        Self { rooms: HashMap::new(), config }
    }

    /// Create a room in `Free` and return its handle.
    pub fn create_room(&mut self, room_id: u64) -> Result<SessionHandle<C>, RegistryError> {
        if self.rooms.contains_key(&room_id) {
            return Err(RegistryError::RoomAlreadyExists(room_id));
        }

        let handle = SessionHandle::new(room_id, self.config.tick_interval, self.config.session);
        self.rooms.insert(room_id, handle.clone());

        tracing::debug!(room_id, "room created");
        Ok(handle)
    }

    /// Handle for `room_id`.
    pub fn get(&self, room_id: u64) -> Option<SessionHandle<C>> {
        self.rooms.get(&room_id).cloned()
    }

    /// Whether `room_id` exists.
    pub fn has_room(&self, room_id: u64) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// Stop and remove a room. Returns its handle.
    pub async fn remove_room(&mut self, room_id: u64) -> Result<SessionHandle<C>, RegistryError> {
        let handle = self.rooms.remove(&room_id).ok_or(RegistryError::RoomNotFound(room_id))?;
        handle.stop().await;

        tracing::debug!(room_id, "room removed");
        Ok(handle)
    }

    /// Stop every room without removing it.
    pub async fn stop_all(&self) {
        for handle in self.rooms.values() {
            handle.stop().await;
        }
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether there are no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Room ids in ascending order.
    pub fn room_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.rooms.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Configuration applied to new rooms.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
