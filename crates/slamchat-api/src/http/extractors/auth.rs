//! Authenticated user extractor.
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! id in the `X-User-Id` header. Requests without it are rejected.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use slamchat_types::room::UserId;

use crate::http::error::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The user the current request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        extract_user_id(parts).map(AuthenticatedUser)
    }
}

fn extract_user_id(parts: &Parts) -> Result<UserId, AppError> {
    let value = parts.headers.get(USER_ID_HEADER).ok_or_else(|| {
        AppError::Unauthorized("Missing user context. Provide it via the 'X-User-Id' header.".to_string())
    })?;

    let raw = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid X-User-Id header encoding".to_string()))?;

    raw.trim()
        .parse::<UserId>()
        .map_err(|_| AppError::Unauthorized(format!("Invalid user id: '{raw}'")))
}
