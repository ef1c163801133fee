//! Message HTTP handlers.
//!
//! Endpoints:
//! - GET  /api/v1/rooms/{id}/messages?after=                  - Messages newer than `after`
//! - GET  /api/v1/rooms/{id}/messages/previous?before=&size=  - One page of older history
//! - GET  /api/v1/rooms/{id}/catch-up                         - Everything the caller has not read
//! - POST /api/v1/rooms/{id}/messages                         - Send a message
//!
//! Every endpoint requires an active membership in the room.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use slamchat_types::error::ChatError;
use slamchat_types::message::{ChatMessage, MessageId};
use slamchat_types::room::{RoomId, UserId};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub after: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct PreviousQuery {
    pub before: Option<MessageId>,
    pub size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

async fn require_member(state: &AppState, user_id: UserId, room_id: RoomId) -> Result<(), AppError> {
    match state.chat_service.is_subscribed(user_id, room_id).await? {
        Some(_) => Ok(()),
        None => Err(ChatError::RoomNotSubscribed.into()),
    }
}

/// GET /api/v1/rooms/{id}/messages - Messages with id greater than `after`.
pub async fn get_messages(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let timer = RequestTimer::start();
    require_member(&state, user_id, room_id).await?;

    let messages = state.chat_service.get_messages(room_id, query.after).await?;
    Ok(Json(timer.finish(messages)))
}

/// GET /api/v1/rooms/{id}/messages/previous - A page of history before `before`.
pub async fn get_previous_messages(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
    Query(query): Query<PreviousQuery>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let timer = RequestTimer::start();

    let messages = state
        .chat_service
        .get_previous_messages(user_id, room_id, query.before, query.size)
        .await?;

    let response = match messages.first() {
        Some(oldest) => {
            let href = format!(
                "/api/v1/rooms/{room_id}/messages/previous?before={}",
                oldest.id
            );
            timer.finish(messages).with_link("next", &href)
        }
        None => timer.finish(messages),
    };
    Ok(Json(response))
}

/// GET /api/v1/rooms/{id}/catch-up - Messages after the caller's read index.
pub async fn catch_up(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let timer = RequestTimer::start();
    let messages = state.chat_service.catch_up(user_id, room_id).await?;
    Ok(Json(timer.finish(messages)))
}

/// POST /api/v1/rooms/{id}/messages - Send a message as the caller.
pub async fn send_message(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(room_id): Path<RoomId>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<ChatMessage>>, AppError> {
    let timer = RequestTimer::start();
    let message = state
        .chat_service
        .send_message(user_id, room_id, &body.content)
        .await?;
    Ok(Json(timer.finish(message)))
}
