//! Redis-backed message cache.
//!
//! Each room is a Redis list at `{prefix}:{room_id}` holding JSON-encoded
//! messages, oldest at the head. Appends push to the tail and trim the head
//! in one MULTI/EXEC so the list never exceeds the window.
//!
//! The connection is established lazily. If Redis is unreachable at startup
//! the cache still comes up, every operation reports `Unavailable` and the
//! chat engine serves from the store; a new connection is attempted at most
//! once per `RECONNECT_INTERVAL`. Once connected, `ConnectionManager`
//! handles reconnects itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use slamchat_core::cache::MessageCache;
use slamchat_types::error::CacheError;
use slamchat_types::message::ChatMessage;
use slamchat_types::room::RoomId;
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

struct Link {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
    last_failure: Mutex<Option<Instant>>,
}

#[derive(Clone)]
pub struct RedisMessageCache {
    link: Arc<Link>,
    prefix: String,
    window: usize,
}

impl RedisMessageCache {
    /// Build the cache without connecting. Fails only on a malformed URL.
    pub fn new(redis_url: &str, prefix: impl Into<String>, window: usize) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(redis_url).map_err(|err| CacheError::Unavailable(err.to_string()))?;
        Ok(Self {
            link: Arc::new(Link {
                client,
                manager: OnceCell::new(),
                last_failure: Mutex::new(None),
            }),
            prefix: prefix.into(),
            window: window.max(1),
        })
    }

    /// Build the cache and make a first connection attempt. An unreachable
    /// server is logged, not returned.
    pub async fn connect(
        redis_url: &str,
        prefix: impl Into<String>,
        window: usize,
    ) -> Result<Self, CacheError> {
        let cache = Self::new(redis_url, prefix, window)?;
        if let Err(err) = cache.connection().await {
            warn!(
                error = %err,
                "Redis unreachable, serving history from the store until it connects"
            );
        }
        Ok(cache)
    }

    pub fn is_connected(&self) -> bool {
        self.link.manager.initialized()
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        if let Some(manager) = self.link.manager.get() {
            return Ok(manager.clone());
        }

        let mut last_failure = self.link.last_failure.lock().await;
        if let Some(manager) = self.link.manager.get() {
            return Ok(manager.clone());
        }
        if let Some(at) = *last_failure {
            if at.elapsed() < RECONNECT_INTERVAL {
                return Err(CacheError::Unavailable("redis is not connected".to_string()));
            }
        }

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(CONNECT_TIMEOUT);
        match ConnectionManager::new_with_config(self.link.client.clone(), config).await {
            Ok(manager) => {
                let _ = self.link.manager.set(manager.clone());
                *last_failure = None;
                info!("Connected to Redis");
                Ok(manager)
            }
            Err(err) => {
                *last_failure = Some(Instant::now());
                Err(unavailable(err))
            }
        }
    }

    fn room_key(&self, room_id: RoomId) -> String {
        room_key(&self.prefix, room_id)
    }
}

/// Redis key of a room's message list.
pub fn room_key(prefix: &str, room_id: RoomId) -> String {
    format!("{prefix}:{room_id}")
}

fn encode(message: &ChatMessage) -> Result<String, CacheError> {
    serde_json::to_string(message).map_err(|err| CacheError::Serialization(err.to_string()))
}

fn decode(payload: &str) -> Result<ChatMessage, CacheError> {
    serde_json::from_str(payload).map_err(|err| CacheError::Serialization(err.to_string()))
}

fn unavailable(err: redis::RedisError) -> CacheError {
    CacheError::Unavailable(err.to_string())
}

impl MessageCache for RedisMessageCache {
    async fn append(&self, message: &ChatMessage) -> Result<(), CacheError> {
        let key = self.room_key(message.room_id);
        let payload = encode(message)?;
        let keep_from = -isize::try_from(self.window).unwrap_or(isize::MAX);

        let mut conn = self.connection().await?;
        let (): () = redis::pipe()
            .atomic()
            .rpush(&key, payload)
            .ignore()
            .ltrim(&key, keep_from, -1)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn remove(&self, message: &ChatMessage) -> Result<bool, CacheError> {
        let key = self.room_key(message.room_id);
        let payload = encode(message)?;

        let mut conn = self.connection().await?;
        // Negative count: remove the occurrence nearest the tail.
        let removed: i64 = conn.lrem(&key, -1, payload).await.map_err(unavailable)?;
        Ok(removed > 0)
    }

    async fn window(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, CacheError> {
        let mut conn = self.connection().await?;
        let payloads: Vec<String> = conn
            .lrange(self.room_key(room_id), 0, -1)
            .await
            .map_err(unavailable)?;
        payloads.iter().map(|payload| decode(payload)).collect()
    }

    async fn last(&self, room_id: RoomId) -> Result<Option<ChatMessage>, CacheError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .lindex(self.room_key(room_id), -1)
            .await
            .map_err(unavailable)?;
        payload.as_deref().map(decode).transpose()
    }

    async fn invalidate(&self, room_id: RoomId) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: i64 = conn.del(self.room_key(room_id)).await.map_err(unavailable)?;
        Ok(())
    }
}
