use thiserror::Error;

use crate::message::MessageId;

/// Errors from repository operations (used by trait definitions in slamchat-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the fast message cache.
///
/// Never surfaced to chat callers: readers fall back to the durable store and
/// the ingestion pipeline keeps going without the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache entry could not be (de)serialized: {0}")]
    Serialization(String),
}

/// Errors raised by the chat engine.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat room not found")]
    RoomNotFound,

    #[error("chat room already exists")]
    RoomAlreadyExists,

    #[error("membership not found")]
    MembershipNotFound,

    #[error("user is not subscribed to this room")]
    RoomNotSubscribed,

    #[error("message ingestion failed: {0}")]
    IngestionFailure(String),

    /// The durable write failed and the compensating cache delete failed too:
    /// the cache holds a message the store does not.
    #[error("ingestion rollback failed for message {message_id}: {reason}")]
    IngestionRollbackFailed { message_id: MessageId, reason: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
