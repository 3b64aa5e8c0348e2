//! The `/ws/chat` endpoint: history replay plus message submission.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use log::debug;
use serde::Deserialize;

use crate::auth::AuthError;
use crate::ws::protocol::{self, WireMessage};

use super::error::ApiError;
use super::state::AppState;
use super::TokenQuery;

#[derive(Deserialize)]
struct ChatSubmission {
    text: String,
}

/// GET /ws/chat
pub async fn chat_ws(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query.token.as_deref().ok_or(AuthError::MissingToken)?;
    let claims = state.auth.validate_token(token)?;
    Ok(ws.on_upgrade(move |socket| handle_chat_socket(state, claims.username, socket)))
}

async fn handle_chat_socket(state: AppState, username: String, mut socket: WebSocket) {
    // Replay the retained history to this client only, oldest first.
    for msg in state.chat.history() {
        let wire = WireMessage::ChatMessage {
            id: msg.id,
            sender: msg.sender,
            text: msg.text,
            timestamp: msg.timestamp,
        };
        let data = match String::from_utf8(protocol::encode(&wire)) {
            Ok(data) => data,
            Err(_) => continue,
        };
        if socket.send(Message::Text(data.into())).await.is_err() {
            return;
        }
    }

    // New submissions get their ID and timestamp from the log; delivery to
    // all clients happens over the hub's broadcast bus.
    while let Some(incoming) = socket.recv().await {
        match incoming {
            Ok(Message::Text(text)) => {
                if let Ok(submission) = serde_json::from_str::<ChatSubmission>(text.as_str()) {
                    if !submission.text.is_empty() {
                        state.chat.add(&username, &submission.text);
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!("chat socket error for {username}: {err}");
                break;
            }
        }
    }
}
