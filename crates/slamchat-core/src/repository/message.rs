//! MessageRepository trait definition.

use slamchat_types::error::RepositoryError;
use slamchat_types::message::{ChatMessage, MessageId};
use slamchat_types::room::RoomId;

/// Repository trait for durable message persistence.
///
/// The store is the id authority: ids come from `next_message_id` and are
/// strictly increasing across the whole store.
pub trait MessageRepository: Send + Sync {
    /// Allocate the next message id.
    fn next_message_id(
        &self,
    ) -> impl std::future::Future<Output = Result<MessageId, RepositoryError>> + Send;

    /// Persist a message under an id obtained from `next_message_id`.
    fn insert_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Messages with `after_id < id` (and `id < before_id` when given),
    /// ordered by id ASC.
    fn list_range(
        &self,
        room_id: RoomId,
        after_id: MessageId,
        before_id: Option<MessageId>,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// The newest `limit` messages with `id < before_id` (all ids when
    /// `None`), returned ordered by id ASC.
    fn list_before(
        &self,
        room_id: RoomId,
        before_id: Option<MessageId>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// The newest message of a room, if any.
    fn latest_message(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Record that the room's cache list must be invalidated before it is
    /// trusted again. Idempotent.
    fn mark_cache_stale(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Forget a stale mark once the room's cache list was invalidated.
    fn clear_cache_stale(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Every room still marked stale, ascending.
    fn stale_cache_rooms(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<RoomId>, RepositoryError>> + Send;
}
