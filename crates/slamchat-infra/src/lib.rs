//! Infrastructure layer for SlamChat.
//!
//! Contains implementations of the ports defined in `slamchat-core`: SQLite
//! repositories, the Redis and in-process message caches, and the
//! `config.toml` loader.

pub mod cache;
pub mod config;
pub mod sqlite;
