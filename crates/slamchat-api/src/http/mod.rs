//! HTTP/WebSocket layer for SlamChat.
//!
//! Axum-based API at `/api/v1/` with upstream-authenticated user context,
//! envelope response format, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
