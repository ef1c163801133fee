//! Chat engine and repository trait definitions for SlamChat.
//!
//! This crate defines the "ports" (repository and cache traits) that the
//! infrastructure layer implements, plus the services built on them: room
//! registry, membership tracker, message ingestion and history resolution.
//! It depends only on `slamchat-types` -- never on `slamchat-infra` or any
//! database/IO crate.

pub mod cache;
pub mod chat;
pub mod event;
pub mod repository;
