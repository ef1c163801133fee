//! SQLite message repository implementation.
//!
//! Message ids come from the `message_sequence` row, bumped with a single
//! `UPDATE ... RETURNING` on the writer connection. Ids therefore increase
//! across the whole store even when an allocated id is never written (a
//! failed ingest leaves a gap, never a reuse).

use slamchat_core::repository::MessageRepository;
use slamchat_types::error::RepositoryError;
use slamchat_types::message::{ChatMessage, MessageId};
use slamchat_types::room::RoomId;
use sqlx::Row;

use super::pool::DatabasePool;
use super::room::format_datetime;

/// SQLite-backed implementation of `MessageRepository`.
#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: DatabasePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain ChatMessage.
struct ChatMessageRow {
    id: i64,
    room_id: i64,
    sender_id: i64,
    content: String,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            room_id: row.try_get("room_id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            content: self.content,
            created_at: self.created_at,
        }
    }
}

fn map_messages(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ChatMessage>, RepositoryError> {
    rows.iter()
        .map(|row| {
            ChatMessageRow::from_row(row)
                .map(ChatMessageRow::into_message)
                .map_err(|e| RepositoryError::Query(e.to_string()))
        })
        .collect()
}

impl MessageRepository for SqliteMessageRepository {
    async fn next_message_id(&self) -> Result<MessageId, RepositoryError> {
        let row = sqlx::query(
            "UPDATE message_sequence SET value = value + 1 WHERE name = 'messages' RETURNING value",
        )
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .ok_or_else(|| RepositoryError::Query("message sequence row is missing".to_string()))?;

        row.try_get("value")
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (id, room_id, sender_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message.id)
        .bind(message.room_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(&message.created_at)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_range(
        &self,
        room_id: RoomId,
        after_id: MessageId,
        before_id: Option<MessageId>,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages
               WHERE room_id = ? AND id > ? AND (? IS NULL OR id < ?)
               ORDER BY id ASC"#,
        )
        .bind(room_id)
        .bind(after_id)
        .bind(before_id)
        .bind(before_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        map_messages(&rows)
    }

    async fn list_before(
        &self,
        room_id: RoomId,
        before_id: Option<MessageId>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM messages
               WHERE room_id = ? AND (? IS NULL OR id < ?)
               ORDER BY id DESC
               LIMIT ?"#,
        )
        .bind(room_id)
        .bind(before_id)
        .bind(before_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = map_messages(&rows)?;
        messages.reverse();
        Ok(messages)
    }

    async fn latest_message(&self, room_id: RoomId) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM messages WHERE room_id = ? ORDER BY id DESC LIMIT 1")
            .bind(room_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let message_row = ChatMessageRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(message_row.into_message()))
            }
            None => Ok(None),
        }
    }

    async fn mark_cache_stale(&self, room_id: RoomId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO stale_cache_rooms (room_id, marked_at) VALUES (?, ?) ON CONFLICT (room_id) DO NOTHING",
        )
        .bind(room_id)
        .bind(format_datetime(&chrono::Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn clear_cache_stale(&self, room_id: RoomId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM stale_cache_rooms WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn stale_cache_rooms(&self) -> Result<Vec<RoomId>, RepositoryError> {
        sqlx::query_scalar("SELECT room_id FROM stale_cache_rooms ORDER BY room_id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }
}
