//! Application state wiring the chat engine together.
//!
//! `ChatService` is generic over its repository and cache ports; AppState
//! pins it to the SQLite repositories and the configured cache backend.

use std::path::PathBuf;
use std::sync::Arc;

use slamchat_core::chat::ChatService;
use slamchat_infra::cache::ChatCache;
use slamchat_infra::config::load_config;
use slamchat_infra::sqlite::pool::database_url;
use slamchat_infra::sqlite::{
    DatabasePool, SqliteMembershipRepository, SqliteMessageRepository, SqliteRoomRepository,
};
use slamchat_types::config::ChatConfig;

/// Concrete chat service pinned to the infra implementations.
pub type ConcreteChatService = ChatService<
    SqliteRoomRepository,
    SqliteMembershipRepository,
    SqliteMessageRepository,
    ChatCache,
>;

/// Shared application state, used by both CLI commands and HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub config: Arc<ChatConfig>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
    /// Handle on the service's cache, for health reporting.
    pub cache: ChatCache,
}

impl AppState {
    /// Load `config.toml` from `data_dir`, connect the store and cache and
    /// wire the chat service. A Redis URL passed here overrides the file.
    pub async fn init(data_dir: PathBuf, redis_url: Option<String>) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut config = load_config(&data_dir).await;
        if redis_url.is_some() {
            config.cache.redis_url = redis_url;
        }

        Self::with_config(data_dir, config).await
    }

    /// Wire the state from an already-resolved configuration.
    ///
    /// An unreachable Redis does not fail startup: the cache reports itself
    /// unavailable and history is served from the store until it connects.
    pub async fn with_config(data_dir: PathBuf, config: ChatConfig) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;
        let cache = ChatCache::from_config(&config.cache).await?;

        let chat_service = ChatService::new(
            SqliteRoomRepository::new(db_pool.clone()),
            SqliteMembershipRepository::new(db_pool.clone()),
            SqliteMessageRepository::new(db_pool.clone()),
            cache.clone(),
            &config.chat,
        );
        let stale_rooms = chat_service.restore_stale_rooms().await?;

        tracing::info!(
            data_dir = %data_dir.display(),
            cache = cache.backend(),
            cache_connected = cache.is_connected(),
            stale_rooms,
            "Chat engine ready"
        );

        Ok(Self {
            chat_service: Arc::new(chat_service),
            config: Arc::new(config),
            data_dir,
            db_pool,
            cache,
        })
    }
}
