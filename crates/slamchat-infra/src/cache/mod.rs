//! Fast message cache implementations.
//!
//! `ChatCache` picks the backend at startup: Redis when a URL is
//! configured, the in-process cache otherwise. A configured but unreachable
//! Redis stays the backend; the engine reads from the store until it comes
//! up.

pub mod memory;
pub mod redis_cache;

pub use memory::InMemoryMessageCache;
pub use redis_cache::RedisMessageCache;

use slamchat_core::cache::MessageCache;
use slamchat_types::config::CacheConfig;
use slamchat_types::error::CacheError;
use slamchat_types::message::ChatMessage;
use slamchat_types::room::RoomId;

/// The configured cache backend.
#[derive(Clone)]
pub enum ChatCache {
    Redis(RedisMessageCache),
    Memory(InMemoryMessageCache),
}

impl ChatCache {
    /// Build the backend described by `config`.
    pub async fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        match &config.redis_url {
            Some(url) => {
                let cache = RedisMessageCache::connect(url, &config.key_prefix, config.window).await?;
                tracing::info!(prefix = %config.key_prefix, window = config.window, "Using Redis message cache");
                Ok(Self::Redis(cache))
            }
            None => {
                tracing::info!(window = config.window, "Using in-process message cache");
                Ok(Self::Memory(InMemoryMessageCache::new(config.window)))
            }
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::Memory(_) => "memory",
        }
    }

    /// Whether the backend has a live connection. Always true in-process.
    pub fn is_connected(&self) -> bool {
        match self {
            Self::Redis(cache) => cache.is_connected(),
            Self::Memory(_) => true,
        }
    }
}

impl MessageCache for ChatCache {
    async fn append(&self, message: &ChatMessage) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.append(message).await,
            Self::Memory(cache) => cache.append(message).await,
        }
    }

    async fn remove(&self, message: &ChatMessage) -> Result<bool, CacheError> {
        match self {
            Self::Redis(cache) => cache.remove(message).await,
            Self::Memory(cache) => cache.remove(message).await,
        }
    }

    async fn window(&self, room_id: RoomId) -> Result<Vec<ChatMessage>, CacheError> {
        match self {
            Self::Redis(cache) => cache.window(room_id).await,
            Self::Memory(cache) => cache.window(room_id).await,
        }
    }

    async fn last(&self, room_id: RoomId) -> Result<Option<ChatMessage>, CacheError> {
        match self {
            Self::Redis(cache) => cache.last(room_id).await,
            Self::Memory(cache) => cache.last(room_id).await,
        }
    }

    async fn invalidate(&self, room_id: RoomId) -> Result<(), CacheError> {
        match self {
            Self::Redis(cache) => cache.invalidate(room_id).await,
            Self::Memory(cache) => cache.invalidate(room_id).await,
        }
    }
}
