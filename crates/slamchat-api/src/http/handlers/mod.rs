//! HTTP request handlers.

pub mod messages;
pub mod rooms;
pub mod ws;
