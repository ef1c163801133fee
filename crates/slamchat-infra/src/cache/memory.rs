//! In-process message cache for single-node deployments and tests.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use slamchat_core::cache::MessageCache;
use slamchat_types::error::CacheError;
use slamchat_types::message::ChatMessage;
use slamchat_types::room::RoomId;

/// Per-room bounded deques behind a concurrent map. Never fails.
#[derive(Clone)]
pub struct InMemoryMessageCache {
    rooms: Arc<DashMap<RoomId, VecDeque<ChatMessage>>>,
    window: usize,
}

impl InMemoryMessageCache {
    pub fn new(window: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            window: window.max(1),
        }
    }
}

impl MessageCache for InMemoryMessageCache {
    async fn append(&self, message: &ChatMessage) -> Result<(), CacheError> {
        let mut list = self.rooms.entry(message.room_id).or_default();
        list.push_back(message.clone());
        while list.len() > self.window {
            list.pop_front();
        }
        Ok(())
    }

    async fn remove(&self, message: &ChatMessage) -> Result<bool, CacheError> {
        let Some(mut list) = self.rooms.get_mut(&message.room_id) else {
            return Ok(false);
        };
        match list.iter().rposition(|cached| cached == message) {
            Some(index) => {
                list.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn window(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, CacheError> {
        Ok(self
            .rooms
            .get(&room_id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn last(&self, room_id: RoomId) -> Result<Option<ChatMessage>, CacheError> {
        Ok(self
            .rooms
            .get(&room_id)
            .and_then(|list| list.back().cloned()))
    }

    async fn invalidate(&self, room_id: RoomId) -> Result<(), CacheError> {
        self.rooms.remove(&room_id);
        Ok(())
    }
}
