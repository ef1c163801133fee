//! Room event bus for live message fan-out.
//!
//! Provides a `RoomEventBus` that distributes `MessagePayload` events to all
//! subscribers of a room topic via `tokio::sync::broadcast` channels.

pub mod bus;

pub use bus::RoomEventBus;
