//! Room registry: create-or-find rooms by logical key.
//!
//! Creation is idempotent on `(room_type, source_key, participant set)`. Two
//! racing creators are resolved by the store's uniqueness constraint: the
//! loser sees a `Conflict`, re-reads, and returns the winner's room.

use slamchat_types::error::{ChatError, RepositoryError};
use slamchat_types::room::{CreateMode, NewRoom, Room, RoomId};
use tracing::{debug, info};

use crate::repository::RoomRepository;

/// Creates and looks up rooms.
pub struct RoomRegistry<R: RoomRepository> {
    rooms: R,
}

impl<R: RoomRepository> RoomRegistry<R> {
    pub fn new(rooms: R) -> Self {
        Self { rooms }
    }

    /// Create a room, or return the existing one with the same logical key.
    ///
    /// With `CreateMode::Strict` an existing match fails with
    /// `ChatError::RoomAlreadyExists`. Creating a room admits nobody; callers
    /// join participants separately.
    pub async fn create_room(
        &self,
        new_room: &NewRoom,
        mode: CreateMode,
    ) -> Result<RoomId, ChatError> {
        validate_new_room(new_room)?;
        let participant_key = new_room.participant_key();

        if let Some(existing) = self.find(new_room, &participant_key).await? {
            return existing_or_conflict(existing, mode);
        }

        match self.rooms.insert_room(new_room).await {
            Ok(room) => {
                info!(
                    room_id = room.id,
                    room_type = %room.room_type,
                    source_key = ?room.source_key,
                    "Chat room created"
                );
                Ok(room.id)
            }
            Err(RepositoryError::Conflict(_)) => {
                debug!(
                    room_type = %new_room.room_type,
                    source_key = ?new_room.source_key,
                    "Lost room creation race, re-reading winner"
                );
                let winner = self
                    .find(new_room, &participant_key)
                    .await?
                    .ok_or_else(|| {
                        ChatError::Repository(RepositoryError::Query(
                            "room conflict reported but no matching room found".to_string(),
                        ))
                    })?;
                existing_or_conflict(winner, mode)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Get a room by id. Soft-deleted rooms count as absent.
    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, ChatError> {
        match self.rooms.get_room(room_id).await? {
            Some(room) if !room.deleted => Ok(room),
            _ => Err(ChatError::RoomNotFound),
        }
    }

    async fn find(
        &self,
        new_room: &NewRoom,
        participant_key: &str,
    ) -> Result<Option<Room>, ChatError> {
        Ok(self
            .rooms
            .find_room_by_key(new_room.room_type, new_room.source_key, participant_key)
            .await?)
    }
}

fn existing_or_conflict(room: Room, mode: CreateMode) -> Result<RoomId, ChatError> {
    match mode {
        CreateMode::Idempotent => Ok(room.id),
        CreateMode::Strict => Err(ChatError::RoomAlreadyExists),
    }
}

fn validate_new_room(new_room: &NewRoom) -> Result<(), ChatError> {
    if new_room.participants.is_empty() {
        return Err(ChatError::Validation(
            "a room needs at least one participant".to_string(),
        ));
    }
    if new_room.name.trim().is_empty() {
        return Err(ChatError::Validation("room name cannot be empty".to_string()));
    }
    Ok(())
}
