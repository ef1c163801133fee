//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use slamchat_types::error::ChatError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Chat engine errors.
    Chat(ChatError),
    /// Missing or malformed user context.
    Unauthorized(String),
    /// Malformed request input.
    Validation(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl AppError {
    /// HTTP status, machine-readable code and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(ChatError::RoomNotFound) => {
                (StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "Chat room not found".to_string())
            }
            AppError::Chat(ChatError::MembershipNotFound) => (
                StatusCode::NOT_FOUND,
                "MEMBERSHIP_NOT_FOUND",
                "Membership not found".to_string(),
            ),
            AppError::Chat(ChatError::RoomAlreadyExists) => (
                StatusCode::CONFLICT,
                "ROOM_ALREADY_EXISTS",
                "Chat room already exists".to_string(),
            ),
            AppError::Chat(ChatError::RoomNotSubscribed) => (
                StatusCode::FORBIDDEN,
                "ROOM_NOT_SUBSCRIBED",
                "You are not a member of this room".to_string(),
            ),
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(e @ ChatError::IngestionFailure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INGESTION_FAILURE", e.to_string())
            }
            AppError::Chat(e @ ChatError::IngestionRollbackFailed { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INGESTION_ROLLBACK_FAILED",
                e.to_string(),
            ),
            AppError::Chat(e @ ChatError::Repository(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "REPOSITORY_ERROR", e.to_string())
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, %message, "Request failed");
        }

        let body = ApiResponse::error(code, &message, uuid::Uuid::now_v7().to_string(), 0);
        (status, Json(body)).into_response()
    }
}
