//! Repository trait definitions (ports).
//!
//! These traits define the durable store interface that the infrastructure
//! layer (slamchat-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod membership;
pub mod message;
pub mod room;

pub use membership::MembershipRepository;
pub use message::MessageRepository;
pub use room::RoomRepository;
