//! Per-room broadcast bus for distributing `MessagePayload` to live subscribers.
//!
//! Each room topic is a `tokio::sync::broadcast` channel created on first
//! subscription. Publishing never blocks: a slow subscriber lags and skips
//! events, a dropped receiver simply stops counting. Topics without
//! receivers are removed on the next publish.

use std::sync::Arc;

use dashmap::DashMap;
use slamchat_types::message::MessagePayload;
use slamchat_types::room::RoomId;
use tokio::sync::broadcast;

/// Multi-topic event bus keyed by room id.
///
/// Cloning the bus shares the topic table, so producers and consumers can
/// hold their own handles.
#[derive(Clone)]
pub struct RoomEventBus {
    topics: Arc<DashMap<RoomId, broadcast::Sender<MessagePayload>>>,
    capacity: usize,
}

impl RoomEventBus {
    /// Create a bus whose per-room channels buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events of a room.
    pub fn subscribe(&self, room_id: RoomId) -> broadcast::Receiver<MessagePayload> {
        self.topics
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Publish a payload to its room's subscribers.
    ///
    /// Returns the number of receivers the event was queued for. With no
    /// subscribers the event is dropped and the topic is cleaned up.
    pub fn publish(&self, payload: MessagePayload) -> usize {
        let room_id = payload.room_id;
        let Some(sender) = self.topics.get(&room_id).map(|entry| entry.value().clone()) else {
            return 0;
        };

        match sender.send(payload) {
            Ok(receivers) => receivers,
            Err(_) => {
                self.topics
                    .remove_if(&room_id, |_, sender| sender.receiver_count() == 0);
                0
            }
        }
    }

    /// Number of live receivers on a room topic.
    pub fn subscriber_count(&self, room_id: RoomId) -> usize {
        self.topics
            .get(&room_id)
            .map(|entry| entry.value().receiver_count())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for RoomEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomEventBus")
            .field("topics", &self.topics.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
