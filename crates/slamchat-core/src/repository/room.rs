//! RoomRepository trait definition.

use slamchat_types::error::RepositoryError;
use slamchat_types::room::{NewRoom, Room, RoomId, RoomType};

/// Repository trait for room persistence.
///
/// Implementations live in slamchat-infra (e.g., `SqliteRoomRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait RoomRepository: Send + Sync {
    /// Insert a new room.
    ///
    /// Must return `RepositoryError::Conflict` when a non-deleted room with the
    /// same `(room_type, source_key, participant_key)` already exists; the
    /// registry relies on this to resolve concurrent creators.
    fn insert_room(
        &self,
        room: &NewRoom,
    ) -> impl std::future::Future<Output = Result<Room, RepositoryError>> + Send;

    /// Get a room by id, including soft-deleted rooms.
    fn get_room(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<Room>, RepositoryError>> + Send;

    /// Find the non-deleted room with the given logical key.
    fn find_room_by_key(
        &self,
        room_type: RoomType,
        source_key: Option<i64>,
        participant_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Room>, RepositoryError>> + Send;
}
