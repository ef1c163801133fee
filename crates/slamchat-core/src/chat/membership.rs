//! Membership tracker: joins, exits, read progress and the first-visit latch.
//!
//! Every mutation is a single conditional store operation, so concurrent
//! calls for the same membership cannot lose updates or double-fire the
//! latch.

use slamchat_types::error::{ChatError, RepositoryError};
use slamchat_types::membership::{Membership, MembershipStatus, RoomSummary};
use slamchat_types::message::MessageId;
use slamchat_types::room::{RoomId, RoomType, UserId};
use tracing::{debug, info, warn};

use crate::cache::MessageCache;
use crate::chat::history::HistoryResolver;
use crate::repository::{MembershipRepository, MessageRepository, RoomRepository};

/// Tracks which users belong to which rooms.
pub struct MembershipTracker<R: RoomRepository, M: MembershipRepository> {
    rooms: R,
    memberships: M,
}

impl<R: RoomRepository, M: MembershipRepository> MembershipTracker<R, M> {
    pub fn new(rooms: R, memberships: M) -> Self {
        Self { rooms, memberships }
    }

    /// Admit a user into a room, or revive their exited membership.
    ///
    /// Revival keeps the stored read-index and first-visit latch. Joining an
    /// active membership again returns it unchanged.
    pub async fn join(
        &self,
        user_id: UserId,
        room_id: RoomId,
        display_name: &str,
    ) -> Result<Membership, ChatError> {
        match self.rooms.get_room(room_id).await? {
            Some(room) if !room.deleted => {}
            _ => return Err(ChatError::RoomNotFound),
        }

        match self.memberships.get_membership(user_id, room_id).await? {
            Some(membership) if membership.is_active() => return Ok(membership),
            Some(_) => {
                let revived = self
                    .memberships
                    .set_status(user_id, room_id, MembershipStatus::Active)
                    .await
                    .map_err(membership_error)?;
                info!(user_id, room_id, "Membership revived");
                return Ok(revived);
            }
            None => {}
        }

        match self
            .memberships
            .insert_membership(user_id, room_id, display_name)
            .await
        {
            Ok(membership) => {
                info!(user_id, room_id, "User joined room");
                Ok(membership)
            }
            Err(RepositoryError::Conflict(_)) => {
                debug!(user_id, room_id, "Concurrent join, re-reading membership");
                self.memberships
                    .get_membership(user_id, room_id)
                    .await?
                    .ok_or(ChatError::MembershipNotFound)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The user's ACTIVE membership in the room, if any.
    pub async fn is_subscribed(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Membership>, ChatError> {
        Ok(self
            .memberships
            .get_membership(user_id, room_id)
            .await?
            .filter(Membership::is_active))
    }

    /// `true` exactly once per membership, however many callers race.
    pub async fn is_first_visit(&self, user_id: UserId, room_id: RoomId) -> Result<bool, ChatError> {
        self.memberships
            .take_first_visit(user_id, room_id)
            .await
            .map_err(membership_error)
    }

    /// Record read progress. Values at or below the stored index are ignored.
    pub async fn update_read_index(
        &self,
        user_id: UserId,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<(), ChatError> {
        let advanced = self
            .memberships
            .advance_read_index(user_id, room_id, message_id)
            .await
            .map_err(membership_error)?;
        debug!(user_id, room_id, message_id, advanced, "Read index update");
        Ok(())
    }

    /// Leave a room, persisting the last read message first.
    pub async fn exit(
        &self,
        user_id: UserId,
        room_id: RoomId,
        read_index: Option<MessageId>,
    ) -> Result<Membership, ChatError> {
        if let Some(message_id) = read_index {
            self.update_read_index(user_id, room_id, message_id).await?;
        }
        let membership = self
            .memberships
            .set_status(user_id, room_id, MembershipStatus::Exited)
            .await
            .map_err(membership_error)?;
        info!(user_id, room_id, read_index = ?membership.read_index, "User exited room");
        Ok(membership)
    }

    /// The user's active rooms, most recently active first.
    ///
    /// Rooms are ordered by their last message (time, then id); rooms
    /// without messages follow, newest membership first.
    pub async fn list_rooms<Msg, C>(
        &self,
        user_id: UserId,
        history: &HistoryResolver<Msg, C>,
    ) -> Result<Vec<RoomSummary>, ChatError>
    where
        Msg: MessageRepository,
        C: MessageCache,
    {
        let memberships = self
            .memberships
            .list_by_user(user_id, Some(MembershipStatus::Active))
            .await?;

        let mut summaries = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let room = match self.rooms.get_room(membership.room_id).await? {
                Some(room) if !room.deleted => room,
                _ => {
                    warn!(user_id, room_id = membership.room_id, "Membership points at a missing room");
                    continue;
                }
            };
            let last_message = history.get_last_message(room.id).await?;
            let name = if membership.display_name.trim().is_empty() {
                room.name
            } else {
                membership.display_name
            };
            summaries.push(RoomSummary {
                room_id: room.id,
                room_type: room.room_type,
                name,
                image_url: room.image_url,
                read_index: membership.read_index,
                last_message,
            });
        }

        // Stable sort: message-less rooms keep the newest-membership order.
        summaries.sort_by(|a, b| recency(b).cmp(&recency(a)));
        Ok(summaries)
    }

    /// Active members of a room, oldest first.
    pub async fn members(&self, room_id: RoomId) -> Result<Vec<Membership>, ChatError> {
        Ok(self
            .memberships
            .list_by_room(room_id, Some(MembershipStatus::Active))
            .await?)
    }

    /// The user's memberships in rooms with the given name and type.
    pub async fn find_joined_room(
        &self,
        user_id: UserId,
        room_name: &str,
        room_type: RoomType,
    ) -> Result<Vec<Membership>, ChatError> {
        Ok(self
            .memberships
            .find_by_room_name(user_id, room_name, room_type)
            .await?)
    }
}

fn recency(summary: &RoomSummary) -> Option<(&str, MessageId)> {
    summary
        .last_message
        .as_ref()
        .map(|m| (m.created_at.as_str(), m.id))
}

fn membership_error(err: RepositoryError) -> ChatError {
    match err {
        RepositoryError::NotFound => ChatError::MembershipNotFound,
        other => ChatError::Repository(other),
    }
}
