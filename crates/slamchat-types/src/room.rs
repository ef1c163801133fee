//! Room types for SlamChat.
//!
//! A room is a conversation scope identified by its logical key:
//! `(room type, source key, participant set)`. At most one non-deleted room
//! exists per logical key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Store-generated room identifier.
pub type RoomId = i64;

/// Platform user identifier, issued by the authentication layer.
pub type UserId = i64;

/// Kind of conversation a room hosts.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (room_type IN ('direct', 'basketball', 'team_matching', 'together'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    /// One-to-one chat; the source key is the opposing user id.
    Direct,
    /// Court chat; the source key is the basketball court id.
    Basketball,
    /// Team-matching post chat; the source key is the post id.
    TeamMatching,
    /// "Together" (pickup game) post chat; the source key is the post id.
    Together,
}

impl RoomType {
    /// Column value stored in the `rooms.room_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Direct => "direct",
            RoomType::Basketball => "basketball",
            RoomType::TeamMatching => "team_matching",
            RoomType::Together => "together",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(RoomType::Direct),
            "basketball" => Ok(RoomType::Basketball),
            "team_matching" => Ok(RoomType::TeamMatching),
            "together" => Ok(RoomType::Together),
            other => Err(format!("invalid room type: '{other}'")),
        }
    }
}

/// How `create_room` reacts when a room with the same logical key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateMode {
    /// Return the existing room id.
    #[default]
    Idempotent,
    /// Fail with `RoomAlreadyExists`.
    Strict,
}

/// A persisted chat room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub room_type: RoomType,
    /// Opposing user id, court id or post id depending on `room_type`.
    pub source_key: Option<i64>,
    /// Canonical participant set, see [`participant_key`].
    pub participant_key: String,
    pub name: String,
    pub image_url: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoom {
    pub room_type: RoomType,
    pub source_key: Option<i64>,
    pub participants: Vec<UserId>,
    pub name: String,
    pub image_url: Option<String>,
}

impl NewRoom {
    /// Canonical key for this room's participant set.
    pub fn participant_key(&self) -> String {
        participant_key(&self.participants)
    }
}

/// Render a participant set as a canonical string: sorted, de-duplicated,
/// comma separated. Two requests naming the same users in any order produce
/// the same key.
pub fn participant_key(participants: &[UserId]) -> String {
    let mut ids = participants.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Room topic that live subscribers listen on.
pub fn room_topic(room_id: RoomId) -> String {
    format!("/sub/chat/room/{room_id}")
}
