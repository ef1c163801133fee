//! Rooms whose cache list may disagree with the durable store.
//!
//! A room lands here when its cache list could not be invalidated after a
//! failed append or a failed rollback. Ingestion skips appends for it until
//! an invalidation goes through, and history reads treat it as a cache miss.
//! The set is shared between the two, and mirrored in the store so a
//! restart does not forget it.

use std::sync::Arc;

use dashmap::DashSet;
use slamchat_types::room::RoomId;

#[derive(Clone, Default)]
pub struct StaleRooms {
    rooms: Arc<DashSet<RoomId>>,
}

impl StaleRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, room_id: RoomId) -> bool {
        self.rooms.contains(&room_id)
    }

    /// Returns whether the room was not already marked.
    pub fn mark(&self, room_id: RoomId) -> bool {
        self.rooms.insert(room_id)
    }

    pub fn clear(&self, room_id: RoomId) {
        self.rooms.remove(&room_id);
    }

    pub fn rooms(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|room| *room).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
