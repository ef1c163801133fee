//! SQLite membership repository implementation.
//!
//! The first-visit latch and the read-index are changed with single
//! conditional UPDATE statements on the single-connection writer, so two
//! concurrent callers can never both observe the latch armed or move the
//! read-index backwards.

use chrono::Utc;
use slamchat_core::repository::MembershipRepository;
use slamchat_types::error::RepositoryError;
use slamchat_types::membership::{Membership, MembershipStatus};
use slamchat_types::message::MessageId;
use slamchat_types::room::{RoomId, RoomType, UserId};
use sqlx::Row;

use super::pool::DatabasePool;
use super::room::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `MembershipRepository`.
#[derive(Clone)]
pub struct SqliteMembershipRepository {
    pool: DatabasePool,
}

impl SqliteMembershipRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, user_id: UserId, room_id: RoomId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM memberships WHERE user_id = ? AND room_id = ?")
            .bind(user_id)
            .bind(room_id)
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }
}

/// Internal row type for mapping SQLite rows to domain Membership.
struct MembershipRow {
    id: i64,
    user_id: i64,
    room_id: i64,
    display_name: String,
    read_index: Option<i64>,
    first_visit: bool,
    status: String,
    created_at: String,
    updated_at: String,
}

impl MembershipRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            room_id: row.try_get("room_id")?,
            display_name: row.try_get("display_name")?,
            read_index: row.try_get("read_index")?,
            first_visit: row.try_get("first_visit")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_membership(self) -> Result<Membership, RepositoryError> {
        let status: MembershipStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Membership {
            id: self.id,
            user_id: self.user_id,
            room_id: self.room_id,
            display_name: self.display_name,
            read_index: self.read_index,
            first_visit_pending: self.first_visit,
            status,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_memberships(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<Membership>, RepositoryError> {
    let mut memberships = Vec::with_capacity(rows.len());
    for row in rows {
        let membership_row =
            MembershipRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        memberships.push(membership_row.into_membership()?);
    }
    Ok(memberships)
}

impl MembershipRepository for SqliteMembershipRepository {
    async fn insert_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
        display_name: &str,
    ) -> Result<Membership, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO memberships (user_id, room_id, display_name, read_index, first_visit, status, created_at, updated_at)
               VALUES (?, ?, ?, NULL, 1, 'active', ?, ?)"#,
        )
        .bind(user_id)
        .bind(room_id)
        .bind(display_name)
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) => Ok(Membership {
                id: done.last_insert_rowid(),
                user_id,
                room_id,
                display_name: display_name.to_string(),
                read_index: None,
                first_visit_pending: true,
                status: MembershipStatus::Active,
                created_at: now,
                updated_at: now,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "user {user_id} already has a membership in room {room_id}"
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Membership>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM memberships WHERE user_id = ? AND room_id = ?")
            .bind(user_id)
            .bind(room_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let membership_row = MembershipRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(membership_row.into_membership()?))
            }
            None => Ok(None),
        }
    }

    async fn list_by_user(
        &self,
        user_id: UserId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<Membership>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM memberships
               WHERE user_id = ? AND (? IS NULL OR status = ?)
               ORDER BY id DESC"#,
        )
        .bind(user_id)
        .bind(status.map(|s| s.to_string()))
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_memberships(&rows)
    }

    async fn list_by_room(
        &self,
        room_id: RoomId,
        status: Option<MembershipStatus>,
    ) -> Result<Vec<Membership>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM memberships
               WHERE room_id = ? AND (? IS NULL OR status = ?)
               ORDER BY id ASC"#,
        )
        .bind(room_id)
        .bind(status.map(|s| s.to_string()))
        .bind(status.map(|s| s.to_string()))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_memberships(&rows)
    }

    async fn find_by_room_name(
        &self,
        user_id: UserId,
        room_name: &str,
        room_type: RoomType,
    ) -> Result<Vec<Membership>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT m.* FROM memberships m
               JOIN rooms r ON r.id = m.room_id
               WHERE m.user_id = ? AND r.name = ? AND r.room_type = ?
               ORDER BY m.id ASC"#,
        )
        .bind(user_id)
        .bind(room_name)
        .bind(room_type.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_memberships(&rows)
    }

    async fn set_status(
        &self,
        user_id: UserId,
        room_id: RoomId,
        status: MembershipStatus,
    ) -> Result<Membership, RepositoryError> {
        let row = sqlx::query(
            r#"UPDATE memberships SET status = ?, updated_at = ?
               WHERE user_id = ? AND room_id = ?
               RETURNING *"#,
        )
        .bind(status.to_string())
        .bind(format_datetime(&Utc::now()))
        .bind(user_id)
        .bind(room_id)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .ok_or(RepositoryError::NotFound)?;

        MembershipRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_membership()
    }

    async fn advance_read_index(
        &self,
        user_id: UserId,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE memberships SET read_index = ?, updated_at = ?
               WHERE user_id = ? AND room_id = ? AND (read_index IS NULL OR read_index < ?)"#,
        )
        .bind(message_id)
        .bind(format_datetime(&Utc::now()))
        .bind(user_id)
        .bind(room_id)
        .bind(message_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(user_id, room_id).await? {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    async fn take_first_visit(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE memberships SET first_visit = 0, updated_at = ?
               WHERE user_id = ? AND room_id = ? AND first_visit = 1"#,
        )
        .bind(format_datetime(&Utc::now()))
        .bind(user_id)
        .bind(room_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(user_id, room_id).await? {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}
