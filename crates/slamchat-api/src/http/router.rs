//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Rooms
        .route(
            "/rooms",
            post(handlers::rooms::create_room).get(handlers::rooms::list_rooms),
        )
        .route("/rooms/{id}", get(handlers::rooms::get_room))
        // Membership
        .route("/rooms/{id}/join", post(handlers::rooms::join_room))
        .route("/rooms/{id}/exit", post(handlers::rooms::exit_room))
        .route("/rooms/{id}/read", put(handlers::rooms::mark_read))
        // Messages
        .route(
            "/rooms/{id}/messages",
            get(handlers::messages::get_messages).post(handlers::messages::send_message),
        )
        .route(
            "/rooms/{id}/messages/previous",
            get(handlers::messages::get_previous_messages),
        )
        .route("/rooms/{id}/catch-up", get(handlers::messages::catch_up))
        // Live room traffic
        .route("/ws/rooms/{id}", get(handlers::ws::ws_handler));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness plus the cache backend and whether it is
/// connected (no auth required). A disconnected cache is degraded, not down.
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": state.cache.backend(),
        "cache_connected": state.cache.is_connected(),
    }))
}
