//! History resolver: the one place that decides whether a read is served
//! from the cache window, the durable store, or both.
//!
//! The window always holds the newest messages of a room in id order, so a
//! read splits cleanly at the window's first id: everything below it comes
//! from the store, everything from it on comes from the cache. A room
//! marked stale is read from the store alone until ingestion clears it.

use slamchat_types::error::ChatError;
use slamchat_types::message::{ChatMessage, MessageId};
use slamchat_types::room::RoomId;
use tracing::warn;

use crate::cache::MessageCache;
use crate::chat::stale::StaleRooms;
use crate::repository::MessageRepository;

/// Resolves message history reads across the cache and the durable store.
pub struct HistoryResolver<Msg: MessageRepository, C: MessageCache> {
    messages: Msg,
    cache: C,
    stale: StaleRooms,
    max_page_size: usize,
}

impl<Msg: MessageRepository, C: MessageCache> HistoryResolver<Msg, C> {
    pub fn new(messages: Msg, cache: C, stale: StaleRooms, max_page_size: usize) -> Self {
        Self {
            messages,
            cache,
            stale,
            max_page_size: max_page_size.max(1),
        }
    }

    /// All messages of a room with id greater than `after_id`, oldest first.
    ///
    /// An unknown room yields an empty list.
    pub async fn get_messages(
        &self,
        room_id: RoomId,
        after_id: MessageId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let window = self.cached_window(room_id).await;
        let Some(first_id) = window.first().map(|m| m.id) else {
            return Ok(self.messages.list_range(room_id, after_id, None).await?);
        };

        if after_id >= first_id {
            return Ok(window.into_iter().filter(|m| m.id > after_id).collect());
        }

        let stored = self
            .messages
            .list_range(room_id, after_id, Some(first_id))
            .await?;
        Ok(splice(stored, window))
    }

    /// One page of older history: up to `page_size` messages with id below
    /// `before_id` (the newest page when `None`), oldest first.
    pub async fn previous_page(
        &self,
        room_id: RoomId,
        before_id: Option<MessageId>,
        page_size: usize,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let page_size = page_size.clamp(1, self.max_page_size);
        let window = self.cached_window(room_id).await;
        let Some(first_id) = window.first().map(|m| m.id) else {
            return Ok(self.messages.list_before(room_id, before_id, page_size).await?);
        };

        let mut cached: Vec<ChatMessage> = window
            .into_iter()
            .filter(|m| before_id.is_none_or(|before| m.id < before))
            .collect();
        if cached.len() >= page_size {
            return Ok(cached.split_off(cached.len() - page_size));
        }

        let store_bound = match before_id {
            Some(before) if before < first_id => before,
            _ => first_id,
        };
        let remaining = page_size - cached.len();
        let stored = self
            .messages
            .list_before(room_id, Some(store_bound), remaining)
            .await?;
        Ok(splice(stored, cached))
    }

    /// The newest message of a room; `None` for an empty or unknown room.
    pub async fn get_last_message(
        &self,
        room_id: RoomId,
    ) -> Result<Option<ChatMessage>, ChatError> {
        if self.stale.contains(room_id) {
            return Ok(self.messages.latest_message(room_id).await?);
        }
        match self.cache.last(room_id).await {
            Ok(Some(message)) => return Ok(Some(message)),
            Ok(None) => {}
            Err(err) => {
                warn!(room_id, error = %err, "Cache tail read failed, using store");
            }
        }
        Ok(self.messages.latest_message(room_id).await?)
    }

    async fn cached_window(&self, room_id: RoomId) -> Vec<ChatMessage> {
        if self.stale.contains(room_id) {
            return Vec::new();
        }
        match self.cache.window(room_id).await {
            Ok(window) => window,
            Err(err) => {
                warn!(room_id, error = %err, "Cache window read failed, using store");
                Vec::new()
            }
        }
    }
}

/// Join a store range and the cached tail that follows it. Cached entries at
/// or below the last stored id are dropped so no id appears twice.
fn splice(mut stored: Vec<ChatMessage>, cached: Vec<ChatMessage>) -> Vec<ChatMessage> {
    let last_stored = stored.last().map(|m| m.id);
    stored.extend(
        cached
            .into_iter()
            .filter(|m| last_stored.is_none_or(|last| m.id > last)),
    );
    stored
}
