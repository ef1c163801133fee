//! MembershipRepository trait definition.
//!
//! The latch and read-index mutations are expressed as single conditional
//! operations so implementations can make them atomic per row.

use slamchat_types::error::RepositoryError;
use slamchat_types::membership::{Membership, MembershipStatus};
use slamchat_types::message::MessageId;
use slamchat_types::room::{RoomId, RoomType, UserId};

/// Repository trait for user-room membership persistence.
pub trait MembershipRepository: Send + Sync {
    /// Insert a new ACTIVE membership with the first-visit latch armed.
    ///
    /// Returns `RepositoryError::Conflict` if `(user_id, room_id)` exists.
    fn insert_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        display_name: &str,
    ) -> impl std::future::Future<Output = Result<Membership, RepositoryError>> + Send;

    /// Get the membership for `(user_id, room_id)` in any status.
    fn get_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<Membership>, RepositoryError>> + Send;

    /// List a user's memberships, newest first. `None` lists every status.
    fn list_by_user(
        &self,
        user_id: UserId,
        status: Option<MembershipStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<Membership>, RepositoryError>> + Send;

    /// List the memberships of a room, oldest first. `None` lists every status.
    fn list_by_room(
        &self,
        room_id: RoomId,
        status: Option<MembershipStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<Membership>, RepositoryError>> + Send;

    /// Find a user's memberships in rooms with the given name and type.
    fn find_by_room_name(
        &self,
        user_id: UserId,
        room_name: &str,
        room_type: RoomType,
    ) -> impl std::future::Future<Output = Result<Vec<Membership>, RepositoryError>> + Send;

    /// Set the membership status and return the updated row.
    ///
    /// Returns `RepositoryError::NotFound` if the membership does not exist.
    fn set_status(
        &self,
        user_id: UserId,
        room_id: RoomId,
        status: MembershipStatus,
    ) -> impl std::future::Future<Output = Result<Membership, RepositoryError>> + Send;

    /// Raise the read-index to `message_id` if it is unset or lower.
    ///
    /// Returns whether the stored value changed. Returns
    /// `RepositoryError::NotFound` if the membership does not exist.
    fn advance_read_index(
        &self,
        user_id: UserId,
        room_id: RoomId,
        message_id: MessageId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Atomically read and clear the first-visit latch.
    ///
    /// Returns `true` for exactly one caller per membership. Returns
    /// `RepositoryError::NotFound` if the membership does not exist.
    fn take_first_visit(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
