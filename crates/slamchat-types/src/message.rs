//! Chat message types and the payload published to room subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::room::{RoomId, UserId};

/// Store-allocated message identifier. Strictly increasing; the canonical
/// ordering of messages within a room.
pub type MessageId = i64;

/// Format of `ChatMessage::created_at`: UTC, second precision. The same string
/// is written to the cache and the store so both tiers compare equal.
pub const CREATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp in [`CREATION_TIME_FORMAT`].
pub fn format_creation_time(at: &DateTime<Utc>) -> String {
    at.format(CREATION_TIME_FORMAT).to_string()
}

/// A single immutable message in a room.
///
/// This is also the serialized form stored in the fast cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: String,
}

/// Event published on a room topic after a message is ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    pub creation_time: String,
}

impl From<&ChatMessage> for MessagePayload {
    fn from(message: &ChatMessage) -> Self {
        Self {
            message_id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            creation_time: message.created_at.clone(),
        }
    }
}
