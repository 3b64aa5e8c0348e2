//! Route definitions.

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::chat;
use super::screen;
use super::state::AppState;
use super::terminal;

/// Build the application router. Authentication happens inside each
/// WebSocket handler, before the upgrade.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/ws/screen", get(screen::screen_ws))
        .route("/ws/terminal/{id}", get(terminal::terminal_ws))
        .route("/ws/chat", get(chat::chat_ws))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
