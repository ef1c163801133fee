//! Shared domain types for SlamChat.
//!
//! This crate contains the chat domain types used across the workspace:
//! Room, Membership, ChatMessage, configuration, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod membership;
pub mod message;
pub mod room;
