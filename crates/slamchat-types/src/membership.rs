//! Membership types: a user's binding to a room.
//!
//! Ownership runs one way. A membership holds the user and room ids; a
//! room's member list is a query, never a maintained back-reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::message::{ChatMessage, MessageId};
use crate::room::{RoomId, RoomType, UserId};

/// Lifecycle status of a membership.
///
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('active', 'exited'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    /// Soft-exited. Revived in place when the user joins again.
    Exited,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipStatus::Active => write!(f, "active"),
            MembershipStatus::Exited => write!(f, "exited"),
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(MembershipStatus::Active),
            "exited" => Ok(MembershipStatus::Exited),
            other => Err(format!("invalid membership status: '{other}'")),
        }
    }
}

impl Default for MembershipStatus {
    fn default() -> Self {
        MembershipStatus::Active
    }
}

/// A user's binding to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: i64,
    pub user_id: UserId,
    pub room_id: RoomId,
    /// Per-membership room title (e.g. the partner's nickname in a DIRECT room).
    pub display_name: String,
    /// Id of the last message the user acknowledged. Never decreases.
    pub read_index: Option<MessageId>,
    /// One-shot latch: true until the first `is_first_visit` call consumes it.
    pub first_visit_pending: bool,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

/// One entry of a user's room list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub room_type: RoomType,
    pub name: String,
    pub image_url: Option<String>,
    pub read_index: Option<MessageId>,
    /// Preview of the newest message, absent for rooms with no messages yet.
    pub last_message: Option<ChatMessage>,
}
