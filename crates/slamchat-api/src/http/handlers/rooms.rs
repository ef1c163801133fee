//! Room and membership HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/rooms            - Create (or find) a match room and admit its participants
//! - GET  /api/v1/rooms            - Rooms the caller belongs to, newest activity first
//! - GET  /api/v1/rooms/{id}       - A room and its members
//! - POST /api/v1/rooms/{id}/join  - Join (or rejoin) a room
//! - POST /api/v1/rooms/{id}/exit  - Leave a room, optionally recording the read index
//! - PUT  /api/v1/rooms/{id}/read  - Advance the caller's read index

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use slamchat_core::chat::Seat;
use slamchat_types::membership::{Membership, RoomSummary};
use slamchat_types::message::MessageId;
use slamchat_types::room::{NewRoom, Room, RoomId, RoomType, UserId};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Request body for room creation.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub room_type: RoomType,
    pub source_key: Option<i64>,
    pub participants: Vec<UserId>,
    pub name: String,
    pub image_url: Option<String>,
    /// Per-participant room titles. Participants without a seat see `name`.
    #[serde(default)]
    pub seats: Vec<SeatRequest>,
}

#[derive(Debug, Deserialize)]
pub struct SeatRequest {
    pub user_id: UserId,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedRoom {
    pub room_id: RoomId,
}

#[derive(Debug, Serialize)]
pub struct RoomDetail {
    pub room: Room,
    pub members: Vec<Membership>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    /// Title the caller sees for this room. Defaults to the room name.
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExitRequest {
    pub read_index: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    pub message_id: MessageId,
}

#[derive(Debug, Serialize)]
pub struct ReadAck {
    pub room_id: RoomId,
    pub message_id: MessageId,
}

/// POST /api/v1/rooms - Create (or find) a room for a match.
pub async fn create_room(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<ApiResponse<CreatedRoom>>, AppError> {
    let timer = RequestTimer::start();

    if body.participants.is_empty() {
        return Err(AppError::Validation(
            "A room needs at least one participant".to_string(),
        ));
    }

    let new_room = NewRoom {
        room_type: body.room_type,
        source_key: body.source_key,
        participants: body.participants,
        name: body.name,
        image_url: body.image_url,
    };
    let seats: Vec<Seat> = body
        .seats
        .into_iter()
        .map(|seat| Seat {
            user_id: seat.user_id,
            display_name: seat.display_name,
        })
        .collect();

    let room_id = state
        .chat_service
        .create_room_for_match(&new_room, &seats)
        .await?;

    tracing::debug!(room_id, requested_by = user_id, "Room created via API");

    let href = format!("/api/v1/rooms/{room_id}");
    Ok(Json(timer.finish(CreatedRoom { room_id }).with_link("self", &href)))
}

/// GET /api/v1/rooms - The caller's rooms.
pub async fn list_rooms(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<RoomSummary>>>, AppError> {
    let timer = RequestTimer::start();
    let rooms = state.chat_service.list_rooms(user_id).await?;
    Ok(Json(timer.finish(rooms)))
}

/// GET /api/v1/rooms/{id} - Room details and members.
pub async fn get_room(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(room_id): Path<RoomId>,
) -> Result<Json<ApiResponse<RoomDetail>>, AppError> {
    let timer = RequestTimer::start();

    let room = state.chat_service.get_room(room_id).await?;
    let members = state.chat_service.members(room_id).await?;

    let href = format!("/api/v1/rooms/{room_id}/messages");
    Ok(Json(
        timer
            .finish(RoomDetail { room, members })
            .with_link("messages", &href),
    ))
}

/// POST /api/v1/rooms/{id}/join - Join a room or revive an exited membership.
pub async fn join_room(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
    Json(body): Json<JoinRequest>,
) -> Result<Json<ApiResponse<Membership>>, AppError> {
    let timer = RequestTimer::start();

    let display_name = match body.display_name {
        Some(name) => name,
        None => state.chat_service.get_room(room_id).await?.name,
    };

    let membership = state
        .chat_service
        .admit_user(user_id, room_id, &display_name)
        .await?;

    Ok(Json(timer.finish(membership)))
}

/// POST /api/v1/rooms/{id}/exit - Leave a room.
pub async fn exit_room(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
    Json(body): Json<ExitRequest>,
) -> Result<Json<ApiResponse<Membership>>, AppError> {
    let timer = RequestTimer::start();
    let membership = state
        .chat_service
        .exit(user_id, room_id, body.read_index)
        .await?;
    Ok(Json(timer.finish(membership)))
}

/// PUT /api/v1/rooms/{id}/read - Record the last message the caller read.
pub async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
    Json(body): Json<ReadRequest>,
) -> Result<Json<ApiResponse<ReadAck>>, AppError> {
    let timer = RequestTimer::start();
    state
        .chat_service
        .update_read_index(user_id, room_id, body.message_id)
        .await?;
    Ok(Json(timer.finish(ReadAck {
        room_id,
        message_id: body.message_id,
    })))
}
