//! SQLite room repository implementation.
//!
//! The partial unique index `idx_rooms_logical_key` is what resolves
//! concurrent creators: the losing insert fails with a UNIQUE error, mapped
//! to `RepositoryError::Conflict`.

use chrono::{DateTime, Utc};
use slamchat_core::repository::RoomRepository;
use slamchat_types::error::RepositoryError;
use slamchat_types::room::{NewRoom, Room, RoomId, RoomType};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `RoomRepository`.
#[derive(Clone)]
pub struct SqliteRoomRepository {
    pool: DatabasePool,
}

impl SqliteRoomRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain Room.
struct RoomRow {
    id: i64,
    room_type: String,
    source_key: Option<i64>,
    participant_key: String,
    name: String,
    image_url: Option<String>,
    deleted: bool,
    created_at: String,
}

impl RoomRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            room_type: row.try_get("room_type")?,
            source_key: row.try_get("source_key")?,
            participant_key: row.try_get("participant_key")?,
            name: row.try_get("name")?,
            image_url: row.try_get("image_url")?,
            deleted: row.try_get("deleted")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_room(self) -> Result<Room, RepositoryError> {
        let room_type: RoomType = self
            .room_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Room {
            id: self.id,
            room_type,
            source_key: self.source_key,
            participant_key: self.participant_key,
            name: self.name,
            image_url: self.image_url,
            deleted: self.deleted,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_room(row: &sqlx::sqlite::SqliteRow) -> Result<Room, RepositoryError> {
    RoomRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_room()
}

impl RoomRepository for SqliteRoomRepository {
    async fn insert_room(&self, room: &NewRoom) -> Result<Room, RepositoryError> {
        let participant_key = room.participant_key();
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"INSERT INTO rooms (room_type, source_key, participant_key, name, image_url, deleted, created_at)
               VALUES (?, ?, ?, ?, ?, 0, ?)"#,
        )
        .bind(room.room_type.as_str())
        .bind(room.source_key)
        .bind(&participant_key)
        .bind(&room.name)
        .bind(&room.image_url)
        .bind(format_datetime(&created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) => Ok(Room {
                id: done.last_insert_rowid(),
                room_type: room.room_type,
                source_key: room.source_key,
                participant_key,
                name: room.name.clone(),
                image_url: room.image_url.clone(),
                deleted: false,
                created_at,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "{} room for source {:?} and participants [{}] already exists",
                    room.room_type, room.source_key, participant_key
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(map_room).transpose()
    }

    async fn find_room_by_key(
        &self,
        room_type: RoomType,
        source_key: Option<i64>,
        participant_key: &str,
    ) -> Result<Option<Room>, RepositoryError> {
        // Read through the writer so a creator that just lost the race sees
        // the winner's committed row.
        let row = sqlx::query(
            r#"SELECT * FROM rooms
               WHERE room_type = ? AND source_key IS ? AND participant_key = ? AND deleted = 0"#,
        )
        .bind(room_type.as_str())
        .bind(source_key)
        .bind(participant_key)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(map_room).transpose()
    }
}
