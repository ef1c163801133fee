//! Fast message cache port.
//!
//! A per-room, append-only list of recent messages bounded by a FIFO window.
//! Range semantics only: no secondary indexes and no queries. Implementations
//! live in slamchat-infra (Redis and in-process).

use slamchat_types::error::CacheError;
use slamchat_types::message::ChatMessage;
use slamchat_types::room::RoomId;

/// Trait for the per-room recent-message cache.
pub trait MessageCache: Send + Sync {
    /// Append a message to the tail of its room's list, evicting from the
    /// head once the window is exceeded.
    fn append(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;

    /// Remove a previously appended message (compensating delete).
    ///
    /// Returns whether an entry was removed.
    fn remove(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<bool, CacheError>> + Send;

    /// The room's whole cached window, oldest first.
    fn window(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, CacheError>> + Send;

    /// The newest cached message of a room.
    fn last(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, CacheError>> + Send;

    /// Drop the room's list so readers go to the durable store until it is
    /// repopulated by new traffic.
    fn invalidate(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send;
}
