//! End-to-end chat engine scenarios over SQLite and the in-process cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use slamchat_core::cache::MessageCache;
use slamchat_core::chat::ingest::MessageIngestion;
use slamchat_core::chat::{ChatService, Seat, StaleRooms};
use slamchat_core::event::RoomEventBus;
use slamchat_core::repository::MessageRepository;
use slamchat_infra::cache::InMemoryMessageCache;
use slamchat_infra::sqlite::{
    DatabasePool, SqliteMembershipRepository, SqliteMessageRepository, SqliteRoomRepository,
};
use slamchat_types::config::ChatLimits;
use slamchat_types::error::{ChatError, RepositoryError};
use slamchat_types::message::{ChatMessage, MessageId};
use slamchat_types::room::{CreateMode, NewRoom, RoomId, RoomType};
use tempfile::TempDir;

/// Message repository that counts read queries, to prove which reads the
/// cache absorbs.
#[derive(Clone)]
struct CountingMessages {
    inner: SqliteMessageRepository,
    reads: Arc<AtomicUsize>,
}

impl CountingMessages {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MessageRepository for CountingMessages {
    async fn next_message_id(&self) -> Result<MessageId, RepositoryError> {
        self.inner.next_message_id().await
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        self.inner.insert_message(message).await
    }

    async fn list_range(
        &self,
        room_id: RoomId,
        after_id: MessageId,
        before_id: Option<MessageId>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_range(room_id, after_id, before_id).await
    }

    async fn list_before(
        &self,
        room_id: RoomId,
        before_id: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_before(room_id, before_id, limit).await
    }

    async fn latest_message(&self, room_id: RoomId) -> Result<Option<ChatMessage>, RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.latest_message(room_id).await
    }

    async fn mark_cache_stale(&self, room_id: RoomId) -> Result<(), RepositoryError> {
        self.inner.mark_cache_stale(room_id).await
    }

    async fn clear_cache_stale(&self, room_id: RoomId) -> Result<(), RepositoryError> {
        self.inner.clear_cache_stale(room_id).await
    }

    async fn stale_cache_rooms(&self) -> Result<Vec<RoomId>, RepositoryError> {
        self.inner.stale_cache_rooms().await
    }
}

type Service = ChatService<
    SqliteRoomRepository,
    SqliteMembershipRepository,
    CountingMessages,
    InMemoryMessageCache,
>;

struct Harness {
    // Held so the database file outlives the test.
    _dir: TempDir,
    pool: DatabasePool,
    service: Arc<Service>,
    messages: CountingMessages,
    cache: InMemoryMessageCache,
}

async fn harness(window: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("chat.db").display());
    let pool = DatabasePool::new(&url).await.unwrap();
    let (service, messages, cache) = build_service(&pool, window);
    Harness {
        _dir: dir,
        pool,
        service,
        messages,
        cache,
    }
}

fn build_service(
    pool: &DatabasePool,
    window: usize,
) -> (Arc<Service>, CountingMessages, InMemoryMessageCache) {
    build_service_over(pool, InMemoryMessageCache::new(window))
}

/// A service over an existing cache, as after a restart against Redis.
fn build_service_over(
    pool: &DatabasePool,
    cache: InMemoryMessageCache,
) -> (Arc<Service>, CountingMessages, InMemoryMessageCache) {
    let messages = CountingMessages {
        inner: SqliteMessageRepository::new(pool.clone()),
        reads: Arc::new(AtomicUsize::new(0)),
    };
    let service = ChatService::new(
        SqliteRoomRepository::new(pool.clone()),
        SqliteMembershipRepository::new(pool.clone()),
        messages.clone(),
        cache.clone(),
        &ChatLimits::default(),
    );
    (Arc::new(service), messages, cache)
}

fn direct_room(user: i64, partner: i64) -> NewRoom {
    NewRoom {
        room_type: RoomType::Direct,
        source_key: Some(partner),
        participants: vec![user, partner],
        name: format!("direct {user}-{partner}"),
        image_url: None,
    }
}

fn seats(pairs: &[(i64, &str)]) -> Vec<Seat> {
    pairs
        .iter()
        .map(|(user_id, name)| Seat {
            user_id: *user_id,
            display_name: Some(name.to_string()),
        })
        .collect()
}

fn ids(messages: &[ChatMessage]) -> Vec<MessageId> {
    messages.iter().map(|m| m.id).collect()
}

#[tokio::test]
async fn direct_chat_two_messages() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &seats(&[(1, "Dana"), (2, "Alex")]))
        .await
        .unwrap();

    assert!(h.service.is_first_visit(1, room_id).await.unwrap());

    let hello = h.service.send_message(1, room_id, "hello").await.unwrap();
    let reply = h.service.send_message(2, room_id, "hey, 3v3 later?").await.unwrap();
    assert!(reply.id > hello.id);

    let history = h.service.get_messages(room_id, 0).await.unwrap();
    assert_eq!(ids(&history), vec![hello.id, reply.id]);
    assert_eq!(history[0].sender_id, 1);
    assert_eq!(history[1].content, "hey, 3v3 later?");

    let last = h.service.get_last_message(room_id).await.unwrap().unwrap();
    assert_eq!(last.id, reply.id);

    let page = h
        .service
        .get_previous_messages(2, room_id, None, Some(10))
        .await
        .unwrap();
    assert_eq!(
        page.iter()
            .map(|m| (m.sender_id, m.content.as_str()))
            .collect::<Vec<_>>(),
        vec![(1, "hello"), (2, "hey, 3v3 later?")]
    );

    let alex_rooms = h.service.list_rooms(2).await.unwrap();
    assert_eq!(alex_rooms.len(), 1);
    assert_eq!(alex_rooms[0].name, "Alex");
    assert_eq!(alex_rooms[0].last_message.as_ref().map(|m| m.id), Some(reply.id));
}

#[tokio::test]
async fn ids_increase_and_reads_are_repeatable() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();

    let mut sent = Vec::new();
    for n in 0..10 {
        sent.push(h.service.send_message(1 + n % 2, room_id, &format!("m{n}")).await.unwrap());
    }
    assert!(sent.windows(2).all(|pair| pair[0].id < pair[1].id));

    let first = h.service.get_messages(room_id, 0).await.unwrap();
    let second = h.service.get_messages(room_id, 0).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(ids(&first), ids(&sent));
}

#[tokio::test]
async fn cached_read_does_not_touch_store() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();
    let first = h.service.send_message(1, room_id, "one").await.unwrap();
    h.service.send_message(2, room_id, "two").await.unwrap();
    h.service.send_message(1, room_id, "three").await.unwrap();

    let before = h.messages.reads();
    let recent = h.service.get_messages(room_id, first.id).await.unwrap();

    assert_eq!(recent.len(), 2);
    assert_eq!(h.messages.reads(), before);
}

#[tokio::test]
async fn evicted_history_falls_back_to_store() {
    let h = harness(3).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();
    let mut sent = Vec::new();
    for n in 0..8 {
        sent.push(h.service.send_message(1, room_id, &format!("m{n}")).await.unwrap());
    }
    assert_eq!(h.cache.window(room_id).await.unwrap().len(), 3);

    let all = h.service.get_messages(room_id, 0).await.unwrap();
    assert_eq!(ids(&all), ids(&sent));

    let page = h
        .service
        .get_previous_messages(1, room_id, Some(sent[6].id), Some(4))
        .await
        .unwrap();
    assert_eq!(ids(&page), ids(&sent[2..6]));
}

#[tokio::test]
async fn history_survives_restart_with_empty_cache() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();
    let sent = h.service.send_message(1, room_id, "before restart").await.unwrap();

    let (restarted, _messages, _cache) = build_service(&h.pool, 300);

    let history = restarted.get_messages(room_id, 0).await.unwrap();
    assert_eq!(ids(&history), vec![sent.id]);
    let next = restarted.send_message(2, room_id, "after restart").await.unwrap();
    assert!(next.id > sent.id);
}

#[tokio::test]
async fn orphaned_cache_entry_is_dropped_on_restart() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();
    let kept = h.service.send_message(1, room_id, "kept").await.unwrap();

    // A rollback that failed before the restart: cached, never stored.
    let orphan = ChatMessage {
        id: h.messages.next_message_id().await.unwrap(),
        room_id,
        sender_id: 2,
        content: "never stored".to_string(),
        created_at: kept.created_at.clone(),
    };
    h.cache.append(&orphan).await.unwrap();
    h.messages.mark_cache_stale(room_id).await.unwrap();

    let (restarted, messages, cache) = build_service_over(&h.pool, h.cache.clone());
    assert_eq!(restarted.restore_stale_rooms().await.unwrap(), 0);

    assert!(cache.window(room_id).await.unwrap().is_empty());
    assert!(messages.stale_cache_rooms().await.unwrap().is_empty());
    assert_eq!(ids(&restarted.get_messages(room_id, 0).await.unwrap()), vec![kept.id]);
    let last = restarted.get_last_message(room_id).await.unwrap().unwrap();
    assert_eq!(last.id, kept.id);
}

#[tokio::test]
async fn unkeyed_and_negative_key_rooms_do_not_collide() {
    let h = harness(300).await;
    let room = |source_key| NewRoom {
        room_type: RoomType::Together,
        source_key,
        participants: vec![4, 5],
        name: "Pickup crew".to_string(),
        image_url: None,
    };

    let unkeyed = h.service.create_room(&room(None), CreateMode::Idempotent).await.unwrap();
    let negative = h.service.create_room(&room(Some(-1)), CreateMode::Idempotent).await.unwrap();
    assert_ne!(unkeyed, negative);

    let again = h.service.create_room(&room(Some(-1)), CreateMode::Idempotent).await.unwrap();
    assert_eq!(again, negative);
}

#[tokio::test]
async fn concurrent_create_yields_one_room() {
    let h = harness(300).await;
    let new_room = NewRoom {
        room_type: RoomType::TeamMatching,
        source_key: Some(77),
        participants: vec![3, 1, 2],
        name: "Team post 77".to_string(),
        image_url: None,
    };

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&h.service);
        let new_room = new_room.clone();
        handles.push(tokio::spawn(async move {
            service.create_room(&new_room, CreateMode::Idempotent).await.unwrap()
        }));
    }
    let mut room_ids = Vec::new();
    for handle in handles {
        room_ids.push(handle.await.unwrap());
    }
    room_ids.dedup();
    assert_eq!(room_ids.len(), 1);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rooms")
        .fetch_one(&h.pool.reader)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let err = h
        .service
        .create_room(&new_room, CreateMode::Strict)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::RoomAlreadyExists));
}

#[tokio::test]
async fn concurrent_first_visit_fires_once() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = Arc::clone(&h.service);
        handles.push(tokio::spawn(async move {
            service.is_first_visit(2, room_id).await.unwrap()
        }));
    }
    let mut fired = 0;
    for handle in handles {
        if handle.await.unwrap() {
            fired += 1;
        }
    }
    assert_eq!(fired, 1);
}

#[tokio::test]
async fn read_index_is_monotonic_and_survives_exit() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();
    let a = h.service.send_message(1, room_id, "a").await.unwrap();
    let b = h.service.send_message(1, room_id, "b").await.unwrap();
    let c = h.service.send_message(1, room_id, "c").await.unwrap();

    h.service.update_read_index(2, room_id, b.id).await.unwrap();
    h.service.update_read_index(2, room_id, a.id).await.unwrap();
    let exited = h.service.exit(2, room_id, Some(a.id)).await.unwrap();
    assert_eq!(exited.read_index, Some(b.id));

    h.service.admit_user(2, room_id, "Alex").await.unwrap();
    let unread = h.service.catch_up(2, room_id).await.unwrap();
    assert_eq!(ids(&unread), vec![c.id]);

    let err = h.service.update_read_index(9, room_id, c.id).await.unwrap_err();
    assert!(matches!(err, ChatError::MembershipNotFound));
}

#[tokio::test]
async fn failed_store_write_rolls_back_cache() {
    let h = harness(300).await;
    let cache = InMemoryMessageCache::new(300);
    let ingestion = MessageIngestion::new(
        SqliteMessageRepository::new(h.pool.clone()),
        cache.clone(),
        RoomEventBus::new(8),
        StaleRooms::new(),
        2_000,
    );
    let mut rx = ingestion.bus().subscribe(4040);

    // No such room: the foreign key rejects the insert.
    let err = ingestion.ingest(4040, 1, "into the void").await.unwrap_err();

    assert!(matches!(err, ChatError::IngestionFailure(_)));
    assert!(cache.window(4040).await.unwrap().is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn subscribers_see_messages_in_id_order() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();
    let mut rx = h.service.subscribe(room_id);

    let mut handles = Vec::new();
    for n in 0..10 {
        let service = Arc::clone(&h.service);
        handles.push(tokio::spawn(async move {
            service.send_message(1 + n % 2, room_id, "go").await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..10 {
        received.push(rx.recv().await.unwrap().message_id);
    }
    let mut sorted = received.clone();
    sorted.sort_unstable();
    assert_eq!(received, sorted);
}

#[tokio::test]
async fn outsider_is_rejected() {
    let h = harness(300).await;
    let room_id = h
        .service
        .create_room_for_match(&direct_room(1, 2), &[])
        .await
        .unwrap();

    assert!(matches!(
        h.service.send_message(5, room_id, "let me in").await,
        Err(ChatError::RoomNotSubscribed)
    ));
    assert!(matches!(
        h.service.get_previous_messages(5, room_id, None, None).await,
        Err(ChatError::RoomNotSubscribed)
    ));
    assert!(matches!(
        h.service.admit_user(5, 9999, "nobody").await,
        Err(ChatError::RoomNotFound)
    ));
}
