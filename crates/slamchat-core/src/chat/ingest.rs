//! Message ingestion pipeline.
//!
//! Every message of a room passes through that room's funnel lock:
//! id allocation, cache append, durable insert and fan-out all happen in
//! order, so cache lists, store rows and live subscribers all see ids
//! strictly increasing. Rooms never wait on each other.
//!
//! The cache is best-effort. When an append fails the room's list is
//! invalidated so readers fall back to the store; if even the invalidation
//! fails, the room is marked stale (in memory and in the store) and
//! invalidated again before its next append. A failed durable insert is
//! compensated by removing the cached entry, or by a stale mark when the
//! removal fails too.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use slamchat_types::error::{ChatError, RepositoryError};
use slamchat_types::message::{ChatMessage, MessagePayload, format_creation_time};
use slamchat_types::room::{RoomId, UserId};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::cache::MessageCache;
use crate::chat::stale::StaleRooms;
use crate::event::RoomEventBus;
use crate::repository::MessageRepository;

/// Accepts messages, persists them and fans them out to room subscribers.
pub struct MessageIngestion<Msg: MessageRepository, C: MessageCache> {
    messages: Msg,
    cache: C,
    bus: RoomEventBus,
    funnels: DashMap<RoomId, Arc<Mutex<()>>>,
    stale: StaleRooms,
    max_content_length: usize,
}

impl<Msg: MessageRepository, C: MessageCache> MessageIngestion<Msg, C> {
    pub fn new(
        messages: Msg,
        cache: C,
        bus: RoomEventBus,
        stale: StaleRooms,
        max_content_length: usize,
    ) -> Self {
        Self {
            messages,
            cache,
            bus,
            funnels: DashMap::new(),
            stale,
            max_content_length,
        }
    }

    /// The bus ingested messages are published on.
    pub fn bus(&self) -> &RoomEventBus {
        &self.bus
    }

    /// Ingest one message and return it with its store-assigned id.
    ///
    /// Membership is not checked here; the chat service gates senders.
    pub async fn ingest(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        validate_content(content, self.max_content_length)?;

        let funnel = self.funnel(room_id);
        let _guard = funnel.lock().await;

        let id = self
            .messages
            .next_message_id()
            .await
            .map_err(|e| ChatError::IngestionFailure(format!("id allocation failed: {e}")))?;

        let message = ChatMessage {
            id,
            room_id,
            sender_id,
            content: content.to_string(),
            created_at: format_creation_time(&Utc::now()),
        };

        let cached = self.append_to_cache(&message).await;

        if let Err(err) = self.messages.insert_message(&message).await {
            return Err(self.roll_back(&message, cached, err).await);
        }

        let receivers = self.bus.publish(MessagePayload::from(&message));
        debug!(
            room_id,
            message_id = message.id,
            sender_id,
            cached,
            receivers,
            "Message ingested"
        );

        Ok(message)
    }

    /// Load the stale marks a previous process left in the store and retry
    /// their invalidation. Returns how many rooms are still stale.
    pub async fn restore_stale_rooms(&self) -> Result<usize, ChatError> {
        let rooms = self.messages.stale_cache_rooms().await?;
        for room_id in rooms {
            self.stale.mark(room_id);
            let funnel = self.funnel(room_id);
            let _guard = funnel.lock().await;
            self.flush_pending_invalidation(room_id).await;
        }
        Ok(self.stale.len())
    }

    fn funnel(&self, room_id: RoomId) -> Arc<Mutex<()>> {
        self.funnels.entry(room_id).or_default().clone()
    }

    /// Append to the room's cache list. Returns whether the message is cached.
    async fn append_to_cache(&self, message: &ChatMessage) -> bool {
        let room_id = message.room_id;
        if !self.flush_pending_invalidation(room_id).await {
            return false;
        }

        match self.cache.append(message).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    room_id,
                    message_id = message.id,
                    error = %err,
                    "Cache append failed, invalidating room cache"
                );
                self.invalidate(room_id).await;
                false
            }
        }
    }

    /// Retry an invalidation left over from an earlier failure. Returns
    /// whether the room's cache list is safe to append to.
    async fn flush_pending_invalidation(&self, room_id: RoomId) -> bool {
        if !self.stale.contains(room_id) {
            return true;
        }
        match self.cache.invalidate(room_id).await {
            Ok(()) => {
                self.stale.clear(room_id);
                if let Err(err) = self.messages.clear_cache_stale(room_id).await {
                    warn!(room_id, error = %err, "Stale mark not cleared in store");
                }
                debug!(room_id, "Deferred cache invalidation completed");
                true
            }
            Err(err) => {
                warn!(room_id, error = %err, "Deferred cache invalidation failed again");
                false
            }
        }
    }

    async fn invalidate(&self, room_id: RoomId) {
        if let Err(err) = self.cache.invalidate(room_id).await {
            warn!(room_id, error = %err, "Cache invalidation failed, deferring");
            self.mark_stale(room_id).await;
        }
    }

    async fn mark_stale(&self, room_id: RoomId) {
        self.stale.mark(room_id);
        if let Err(err) = self.messages.mark_cache_stale(room_id).await {
            error!(
                alarm = true,
                room_id,
                error = %err,
                "Stale cache mark not persisted; a restart would trust the room's cache"
            );
        }
    }

    /// Undo the cache side effect of a message whose durable write failed.
    async fn roll_back(
        &self,
        message: &ChatMessage,
        cached: bool,
        cause: RepositoryError,
    ) -> ChatError {
        if !cached {
            warn!(
                room_id = message.room_id,
                message_id = message.id,
                error = %cause,
                "Message insert failed"
            );
            return ChatError::IngestionFailure(cause.to_string());
        }

        match self.cache.remove(message).await {
            Ok(_) => {
                warn!(
                    room_id = message.room_id,
                    message_id = message.id,
                    error = %cause,
                    "Message insert failed, cache entry removed"
                );
                ChatError::IngestionFailure(cause.to_string())
            }
            Err(remove_err) => {
                error!(
                    alarm = true,
                    room_id = message.room_id,
                    message_id = message.id,
                    insert_error = %cause,
                    remove_error = %remove_err,
                    "Ingestion rollback failed: cache holds a message the store does not"
                );
                self.mark_stale(message.room_id).await;
                ChatError::IngestionRollbackFailed {
                    message_id: message.id,
                    reason: format!("{cause}; cache remove failed: {remove_err}"),
                }
            }
        }
    }
}

fn validate_content(content: &str, max_len: usize) -> Result<(), ChatError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation("message content cannot be empty".to_string()));
    }
    let len = trimmed.chars().count();
    if len > max_len {
        return Err(ChatError::Validation(format!(
            "message content is {len} characters, the limit is {max_len}"
        )));
    }
    Ok(())
}
