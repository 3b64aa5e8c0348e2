//! HTTP/WebSocket endpoint adapter.
//!
//! Three token-authenticated WebSocket routes bind sockets to the core:
//! `/ws/screen` (control plane + frame sink), `/ws/terminal/{id}` (one PTY
//! session per socket) and `/ws/chat` (history replay + submissions).

mod chat;
pub mod dispatch;
mod error;
mod routes;
mod screen;
mod state;
mod terminal;

use serde::Deserialize;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

/// The `?token=` query parameter carried by every WebSocket URL.
#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}
