//! Configuration types for SlamChat.
//!
//! `ChatConfig` represents the `config.toml` in the data directory. Every
//! field has a default, so an empty or missing file yields a working setup.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the chat server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub chat: ChatLimits,
}

/// Listener settings for the HTTP/WebSocket server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Fast message cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL. When absent, an in-process cache is used.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Prefix of the per-room list key (`{prefix}:{room_id}`).
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Number of most recent messages kept per room. Older entries are
    /// evicted first-in first-out.
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_key_prefix() -> String {
    "chatRoom".to_string()
}

fn default_window() -> usize {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
            window: default_window(),
        }
    }
}

/// Limits applied by the chat engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLimits {
    /// Maximum message length, in characters, after trimming.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Page size used by backward history scroll when the caller sends none.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound on any history page.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Buffered events per room topic before a slow subscriber lags.
    #[serde(default = "default_fanout_capacity")]
    pub fanout_capacity: usize,
}

fn default_max_content_length() -> usize {
    2_000
}

fn default_page_size() -> usize {
    20
}

fn default_max_page_size() -> usize {
    200
}

fn default_fanout_capacity() -> usize {
    256
}

impl Default for ChatLimits {
    fn default() -> Self {
        Self {
            max_content_length: default_max_content_length(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            fanout_capacity: default_fanout_capacity(),
        }
    }
}
