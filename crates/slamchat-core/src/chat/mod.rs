//! Chat engine services.
//!
//! - `registry`: create-or-find rooms by logical key
//! - `membership`: joins, exits, read-index and the first-visit latch
//! - `ingest`: the per-room funneled write path
//! - `history`: cache/store read resolution
//! - `stale`: rooms whose cache list readers must not trust
//! - `service`: the `ChatService` facade over all of the above

pub mod history;
pub mod ingest;
pub mod membership;
pub mod registry;
pub mod service;
pub mod stale;

#[cfg(test)]
pub(crate) mod testing;

pub use service::{ChatService, Seat};
pub use stale::StaleRooms;
