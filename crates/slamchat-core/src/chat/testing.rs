//! In-memory fakes of the repository and cache ports for service tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use slamchat_types::error::{CacheError, RepositoryError};
use slamchat_types::membership::{Membership, MembershipStatus};
use slamchat_types::message::{ChatMessage, MessageId, format_creation_time};
use slamchat_types::room::{NewRoom, Room, RoomId, RoomType, UserId};

use crate::cache::MessageCache;
use crate::repository::{MembershipRepository, MessageRepository, RoomRepository};

pub(crate) fn direct_room(user: UserId, partner: UserId) -> NewRoom {
    NewRoom {
        room_type: RoomType::Direct,
        source_key: Some(partner),
        participants: vec![user, partner],
        name: format!("direct {user}-{partner}"),
        image_url: None,
    }
}

pub(crate) fn message(room_id: RoomId, id: MessageId) -> ChatMessage {
    ChatMessage {
        id,
        room_id,
        sender_id: 1,
        content: format!("message {id}"),
        created_at: format_creation_time(&Utc::now()),
    }
}

pub(crate) fn ids(messages: &[ChatMessage]) -> Vec<MessageId> {
    messages.iter().map(|m| m.id).collect()
}

#[derive(Default)]
struct StoreState {
    rooms: Vec<Room>,
    memberships: Vec<Membership>,
    messages: Vec<ChatMessage>,
    message_sequence: MessageId,
    stale_cache_rooms: BTreeSet<RoomId>,
    hidden_room_lookups: usize,
    fail_message_inserts: bool,
    message_reads: usize,
}

/// Shared in-memory store implementing all three repository traits.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    /// Make the next `n` key lookups miss, as if another creator's insert
    /// had not been visible yet.
    pub(crate) fn hide_rooms_from_next_lookup(&self, n: usize) {
        self.state().hidden_room_lookups = n;
    }

    pub(crate) fn seed_room(&self, new_room: &NewRoom) -> Room {
        let mut state = self.state();
        let room = build_room(state.rooms.len() as RoomId + 1, new_room);
        state.rooms.push(room.clone());
        room
    }

    /// Insert a message directly, bypassing the ingestion pipeline.
    pub(crate) fn seed_message(&self, message: ChatMessage) {
        let mut state = self.state();
        state.message_sequence = state.message_sequence.max(message.id);
        state.messages.push(message);
    }

    pub(crate) fn room_count(&self) -> usize {
        self.state().rooms.len()
    }

    pub(crate) fn stored_ids(&self, room_id: RoomId) -> Vec<MessageId> {
        let state = self.state();
        let mut ids: Vec<_> = state
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .map(|m| m.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn fail_message_inserts(&self, fail: bool) {
        self.state().fail_message_inserts = fail;
    }

    pub(crate) fn persisted_stale_rooms(&self) -> Vec<RoomId> {
        self.state().stale_cache_rooms.iter().copied().collect()
    }

    /// Number of message read queries served so far.
    pub(crate) fn message_reads(&self) -> usize {
        self.state().message_reads
    }

    fn sorted_room_messages(state: &mut StoreState, room_id: RoomId) -> Vec<ChatMessage> {
        state.message_reads += 1;
        let mut messages: Vec<_> = state
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.id);
        messages
    }

    fn update_membership<T>(
        &self,
        user_id: UserId,
        room_id: RoomId,
        f: impl FnOnce(&mut Membership) -> T,
    ) -> Result<T, RepositoryError> {
        let mut state = self.state();
        let membership = state
            .memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.room_id == room_id)
            .ok_or(RepositoryError::NotFound)?;
        let result = f(membership);
        membership.updated_at = Utc::now();
        Ok(result)
    }
}

fn build_room(id: RoomId, new_room: &NewRoom) -> Room {
    Room {
        id,
        room_type: new_room.room_type,
        source_key: new_room.source_key,
        participant_key: new_room.participant_key(),
        name: new_room.name.clone(),
        image_url: new_room.image_url.clone(),
        deleted: false,
        created_at: Utc::now(),
    }
}

impl RoomRepository for MemoryStore {
    async fn insert_room(&self, new_room: &NewRoom) -> Result<Room, RepositoryError> {
        let mut state = self.state();
        let key = new_room.participant_key();
        let taken = state.rooms.iter().any(|r| {
            !r.deleted
                && r.room_type == new_room.room_type
                && r.source_key == new_room.source_key
                && r.participant_key == key
        });
        if taken {
            return Err(RepositoryError::Conflict("rooms".to_string()));
        }
        let room = build_room(state.rooms.len() as RoomId + 1, new_room);
        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, RepositoryError> {
        Ok(self.state().rooms.iter().find(|r| r.id == room_id).cloned())
    }

    async fn find_room_by_key(
        &self,
        room_type: RoomType,
        source_key: Option<i64>,
        participant_key: &str,
    ) -> Result<Option<Room>, RepositoryError> {
        let mut state = self.state();
        if state.hidden_room_lookups > 0 {
            state.hidden_room_lookups -= 1;
            return Ok(None);
        }
        Ok(state
            .rooms
            .iter()
            .find(|r| {
                !r.deleted
                    && r.room_type == room_type
                    && r.source_key == source_key
                    && r.participant_key == participant_key
            })
            .cloned())
    }
}

impl MembershipRepository for MemoryStore {
    async fn insert_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        display_name: &str,
    ) -> Result<Membership, RepositoryError> {
        let mut state = self.state();
        if state
            .memberships
            .iter()
            .any(|m| m.user_id == user_id && m.room_id == room_id)
        {
            return Err(RepositoryError::Conflict("memberships".to_string()));
        }
        let now = Utc::now();
        let membership = Membership {
            id: state.memberships.len() as i64 + 1,
            user_id,
            room_id,
            display_name: display_name.to_string(),
            read_index: None,
            first_visit_pending: true,
            status: MembershipStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn get_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Membership>, RepositoryError> {
        Ok(self
            .state()
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.room_id == room_id)
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<Membership>, RepositoryError> {
        let mut memberships: Vec<_> = self
            .state()
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && status.is_none_or(|s| m.status == s))
            .cloned()
            .collect();
        memberships.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(memberships)
    }

    async fn list_by_room(
        &self,
        room_id: RoomId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<Membership>, RepositoryError> {
        Ok(self
            .state()
            .memberships
            .iter()
            .filter(|m| m.room_id == room_id && status.is_none_or(|s| m.status == s))
            .cloned()
            .collect())
    }

    async fn find_by_room_name(
        &self,
        user_id: UserId,
        room_name: &str,
        room_type: RoomType,
    ) -> Result<Vec<Membership>, RepositoryError> {
        let state = self.state();
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter(|m| {
                state.rooms.iter().any(|r| {
                    r.id == m.room_id && r.name == room_name && r.room_type == room_type
                })
            })
            .cloned()
            .collect())
    }

    async fn set_status(
        &self,
        user_id: UserId,
        room_id: RoomId,
        status: MembershipStatus,
    ) -> Result<Membership, RepositoryError> {
        self.update_membership(user_id, room_id, |m| {
            m.status = status;
            m.clone()
        })
    }

    async fn advance_read_index(
        &self,
        user_id: UserId,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<bool, RepositoryError> {
        self.update_membership(user_id, room_id, |m| {
            if m.read_index.is_none_or(|current| current < message_id) {
                m.read_index = Some(message_id);
                true
            } else {
                false
            }
        })
    }

    async fn take_first_visit(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<bool, RepositoryError> {
        self.update_membership(user_id, room_id, |m| {
            std::mem::replace(&mut m.first_visit_pending, false)
        })
    }
}

impl MessageRepository for MemoryStore {
    async fn next_message_id(&self) -> Result<MessageId, RepositoryError> {
        let mut state = self.state();
        state.message_sequence += 1;
        Ok(state.message_sequence)
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let mut state = self.state();
        if state.fail_message_inserts {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        if !state.rooms.iter().any(|r| r.id == message.room_id) {
            return Err(RepositoryError::Query(
                "FOREIGN KEY constraint failed".to_string(),
            ));
        }
        state.messages.push(message.clone());
        Ok(())
    }

    async fn list_range(
        &self,
        room_id: RoomId,
        after_id: MessageId,
        before_id: Option<MessageId>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut state = self.state();
        Ok(Self::sorted_room_messages(&mut state, room_id)
            .into_iter()
            .filter(|m| m.id > after_id && before_id.is_none_or(|b| m.id < b))
            .collect())
    }

    async fn list_before(
        &self,
        room_id: RoomId,
        before_id: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut state = self.state();
        let mut messages: Vec<_> = Self::sorted_room_messages(&mut state, room_id)
            .into_iter()
            .filter(|m| before_id.is_none_or(|b| m.id < b))
            .collect();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    async fn latest_message(&self, room_id: RoomId) -> Result<Option<ChatMessage>, RepositoryError> {
        let mut state = self.state();
        Ok(Self::sorted_room_messages(&mut state, room_id).pop())
    }

    async fn mark_cache_stale(&self, room_id: RoomId) -> Result<(), RepositoryError> {
        self.state().stale_cache_rooms.insert(room_id);
        Ok(())
    }

    async fn clear_cache_stale(&self, room_id: RoomId) -> Result<(), RepositoryError> {
        self.state().stale_cache_rooms.remove(&room_id);
        Ok(())
    }

    async fn stale_cache_rooms(&self) -> Result<Vec<RoomId>, RepositoryError> {
        Ok(self.persisted_stale_rooms())
    }
}

/// Switches that make `FakeCache` operations fail.
#[derive(Debug, Default)]
pub(crate) struct CacheFaults {
    pub append: bool,
    pub remove: bool,
    pub read: bool,
    pub invalidate: bool,
}

/// Windowed in-memory cache with injectable failures.
#[derive(Clone)]
pub(crate) struct FakeCache {
    lists: Arc<Mutex<HashMap<RoomId, VecDeque<ChatMessage>>>>,
    faults: Arc<Mutex<CacheFaults>>,
    window: usize,
}

impl FakeCache {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            lists: Arc::new(Mutex::new(HashMap::new())),
            faults: Arc::new(Mutex::new(CacheFaults::default())),
            window,
        }
    }

    pub(crate) fn faults(&self) -> MutexGuard<'_, CacheFaults> {
        self.faults.lock().unwrap()
    }

    pub(crate) fn cached_ids(&self, room_id: RoomId) -> Vec<MessageId> {
        self.lists
            .lock()
            .unwrap()
            .get(&room_id)
            .map(|list| list.iter().map(|m| m.id).collect())
            .unwrap_or_default()
    }

    fn check(&self, failing: impl FnOnce(&CacheFaults) -> bool) -> Result<(), CacheError> {
        if failing(&self.faults()) {
            Err(CacheError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl MessageCache for FakeCache {
    async fn append(&self, message: &ChatMessage) -> Result<(), CacheError> {
        self.check(|f| f.append)?;
        let mut lists = self.lists.lock().unwrap();
        let list = lists.entry(message.room_id).or_default();
        list.push_back(message.clone());
        while list.len() > self.window {
            list.pop_front();
        }
        Ok(())
    }

    async fn remove(&self, message: &ChatMessage) -> Result<bool, CacheError> {
        self.check(|f| f.remove)?;
        let mut lists = self.lists.lock().unwrap();
        let Some(list) = lists.get_mut(&message.room_id) else {
            return Ok(false);
        };
        match list.iter().rposition(|m| m == message) {
            Some(index) => {
                list.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn window(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, CacheError> {
        self.check(|f| f.read)?;
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(&room_id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn last(&self, room_id: RoomId) -> Result<Option<ChatMessage>, CacheError> {
        self.check(|f| f.read)?;
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(&room_id)
            .and_then(|list| list.back().cloned()))
    }

    async fn invalidate(&self, room_id: RoomId) -> Result<(), CacheError> {
        self.check(|f| f.invalidate)?;
        self.lists.lock().unwrap().remove(&room_id);
        Ok(())
    }
}
