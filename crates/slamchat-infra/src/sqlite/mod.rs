//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod membership;
pub mod message;
pub mod pool;
pub mod room;

pub use membership::SqliteMembershipRepository;
pub use message::SqliteMessageRepository;
pub use pool::DatabasePool;
pub use room::SqliteRoomRepository;
