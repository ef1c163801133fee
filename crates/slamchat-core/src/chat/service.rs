//! Chat service: the single entry point transports and collaborators use.
//!
//! `ChatService` wires the room registry, membership tracker, ingestion
//! pipeline and history resolver over one set of repositories and one
//! cache, and adds the membership gate in front of the per-user operations.

use slamchat_types::config::ChatLimits;
use slamchat_types::error::ChatError;
use slamchat_types::membership::{Membership, RoomSummary};
use slamchat_types::message::{ChatMessage, MessageId, MessagePayload};
use slamchat_types::room::{CreateMode, NewRoom, Room, RoomId, RoomType, UserId};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cache::MessageCache;
use crate::chat::history::HistoryResolver;
use crate::chat::ingest::MessageIngestion;
use crate::chat::membership::MembershipTracker;
use crate::chat::registry::RoomRegistry;
use crate::chat::stale::StaleRooms;
use crate::event::RoomEventBus;
use crate::repository::{MembershipRepository, MessageRepository, RoomRepository};

/// A participant admitted by `create_room_for_match`, with the room title
/// they see (e.g. the partner's nickname in a DIRECT room).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

/// Orchestrates rooms, memberships and message flow.
///
/// Generic over the repository and cache ports so slamchat-core never
/// depends on slamchat-infra.
pub struct ChatService<R, M, Msg, C>
where
    R: RoomRepository + Clone,
    M: MembershipRepository,
    Msg: MessageRepository + Clone,
    C: MessageCache + Clone,
{
    registry: RoomRegistry<R>,
    tracker: MembershipTracker<R, M>,
    ingestion: MessageIngestion<Msg, C>,
    history: HistoryResolver<Msg, C>,
    default_page_size: usize,
}

impl<R, M, Msg, C> ChatService<R, M, Msg, C>
where
    R: RoomRepository + Clone,
    M: MembershipRepository,
    Msg: MessageRepository + Clone,
    C: MessageCache + Clone,
{
    pub fn new(rooms: R, memberships: M, messages: Msg, cache: C, limits: &ChatLimits) -> Self {
        let bus = RoomEventBus::new(limits.fanout_capacity);
        let stale = StaleRooms::new();
        Self {
            registry: RoomRegistry::new(rooms.clone()),
            tracker: MembershipTracker::new(rooms, memberships),
            ingestion: MessageIngestion::new(
                messages.clone(),
                cache.clone(),
                bus,
                stale.clone(),
                limits.max_content_length,
            ),
            history: HistoryResolver::new(messages, cache, stale, limits.max_page_size),
            default_page_size: limits.default_page_size,
        }
    }

    // --- Rooms ---

    /// Create a room or return the one with the same logical key.
    pub async fn create_room(&self, new_room: &NewRoom, mode: CreateMode) -> Result<RoomId, ChatError> {
        self.registry.create_room(new_room, mode).await
    }

    /// Create (or find) a room for a match and admit every participant.
    ///
    /// Each participant sees the display name of their seat, or the room
    /// name when the seat has none.
    pub async fn create_room_for_match(
        &self,
        new_room: &NewRoom,
        seats: &[Seat],
    ) -> Result<RoomId, ChatError> {
        let room_id = self
            .registry
            .create_room(new_room, CreateMode::Idempotent)
            .await?;

        let mut participants = new_room.participants.clone();
        participants.sort_unstable();
        participants.dedup();
        for user_id in participants {
            let display_name = seats
                .iter()
                .find(|seat| seat.user_id == user_id)
                .and_then(|seat| seat.display_name.as_deref())
                .unwrap_or(&new_room.name);
            self.tracker.join(user_id, room_id, display_name).await?;
        }

        info!(room_id, room_type = %new_room.room_type, "Match room ready");
        Ok(room_id)
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Room, ChatError> {
        self.registry.get_room(room_id).await
    }

    // --- Memberships ---

    /// Admit a user into a room (or revive their exited membership).
    pub async fn admit_user(
        &self,
        user_id: UserId,
        room_id: RoomId,
        display_name: &str,
    ) -> Result<Membership, ChatError> {
        self.tracker.join(user_id, room_id, display_name).await
    }

    pub async fn is_subscribed(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Membership>, ChatError> {
        self.tracker.is_subscribed(user_id, room_id).await
    }

    pub async fn is_first_visit(&self, user_id: UserId, room_id: RoomId) -> Result<bool, ChatError> {
        self.tracker.is_first_visit(user_id, room_id).await
    }

    pub async fn update_read_index(
        &self,
        user_id: UserId,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<(), ChatError> {
        self.tracker.update_read_index(user_id, room_id, message_id).await
    }

    pub async fn exit(
        &self,
        user_id: UserId,
        room_id: RoomId,
        read_index: Option<MessageId>,
    ) -> Result<Membership, ChatError> {
        self.tracker.exit(user_id, room_id, read_index).await
    }

    pub async fn list_rooms(&self, user_id: UserId) -> Result<Vec<RoomSummary>, ChatError> {
        self.tracker.list_rooms(user_id, &self.history).await
    }

    pub async fn members(&self, room_id: RoomId) -> Result<Vec<Membership>, ChatError> {
        self.tracker.members(room_id).await
    }

    pub async fn find_joined_room(
        &self,
        user_id: UserId,
        room_name: &str,
        room_type: RoomType,
    ) -> Result<Vec<Membership>, ChatError> {
        self.tracker.find_joined_room(user_id, room_name, room_type).await
    }

    // --- Messages ---

    /// Send a message as `sender_id`, who must be an active member.
    pub async fn send_message(
        &self,
        sender_id: UserId,
        room_id: RoomId,
        content: &str,
    ) -> Result<ChatMessage, ChatError> {
        self.require_subscribed(sender_id, room_id).await?;
        self.ingestion.ingest(room_id, sender_id, content).await
    }

    /// Messages with id greater than `after_id`, oldest first.
    pub async fn get_messages(
        &self,
        room_id: RoomId,
        after_id: MessageId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        self.history.get_messages(room_id, after_id).await
    }

    /// One page of older history for an active member.
    ///
    /// `page_size` falls back to the configured default.
    pub async fn get_previous_messages(
        &self,
        user_id: UserId,
        room_id: RoomId,
        before_id: Option<MessageId>,
        page_size: Option<usize>,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        self.require_subscribed(user_id, room_id).await?;
        self.history
            .previous_page(room_id, before_id, page_size.unwrap_or(self.default_page_size))
            .await
    }

    pub async fn get_last_message(&self, room_id: RoomId) -> Result<Option<ChatMessage>, ChatError> {
        self.history.get_last_message(room_id).await
    }

    /// Everything the member has not read yet, oldest first.
    pub async fn catch_up(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let membership = self.require_subscribed(user_id, room_id).await?;
        self.history
            .get_messages(room_id, membership.read_index.unwrap_or(0))
            .await
    }

    /// Retry cache invalidations an earlier process could not finish.
    /// Returns how many rooms are still read from the store only.
    pub async fn restore_stale_rooms(&self) -> Result<usize, ChatError> {
        let stale = self.ingestion.restore_stale_rooms().await?;
        if stale > 0 {
            warn!(stale, "Some room caches are still stale, serving them from the store");
        }
        Ok(stale)
    }

    /// Receive every message published to a room from now on.
    pub fn subscribe(&self, room_id: RoomId) -> broadcast::Receiver<MessagePayload> {
        self.ingestion.bus().subscribe(room_id)
    }

    async fn require_subscribed(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Membership, ChatError> {
        self.tracker
            .is_subscribed(user_id, room_id)
            .await?
            .ok_or(ChatError::RoomNotSubscribed)
    }
}
