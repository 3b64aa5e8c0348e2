//! The `/ws/terminal/{id}` endpoint: one PTY session per socket.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use log::{debug, info};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::AuthError;
use crate::terminal::Session;

use super::error::ApiError;
use super::state::AppState;
use super::TokenQuery;

const PTY_READ_CHUNK: usize = 4096;

/// Control message intercepted from the text plane; everything else is
/// written to the shell verbatim.
#[derive(Deserialize)]
struct ResizeRequest {
    #[serde(rename = "type")]
    kind: String,
    rows: u16,
    cols: u16,
}

/// GET /ws/terminal/{id}
pub async fn terminal_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query.token.as_deref().ok_or(AuthError::MissingToken)?;
    state.auth.validate_token(token)?;
    Ok(ws.on_upgrade(move |socket| handle_terminal_socket(state, id, socket)))
}

async fn handle_terminal_socket(state: AppState, id: String, mut socket: WebSocket) {
    let session = match state.terminals.create(&id) {
        Ok(session) => session,
        Err(err) => {
            let _ = socket
                .send(Message::Text(
                    format!("Failed to create terminal: {err}").into(),
                ))
                .await;
            return;
        }
    };

    let reader = match session.clone_reader() {
        Ok(reader) => reader,
        Err(err) => {
            debug!("terminal {id}: reader unavailable: {err}");
            state.terminals.close(&id);
            return;
        }
    };

    // PTY output is read on a blocking thread and shuttled through a
    // channel; the thread exits once the child dies or the channel closes.
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(32);
    tokio::task::spawn_blocking(move || {
        let mut reader = reader;
        let mut buf = [0u8; PTY_READ_CHUNK];
        loop {
            match std::io::Read::read(&mut reader, &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if out_tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        tokio::select! {
            chunk = out_rx.recv() => match chunk {
                Some(data) => {
                    if socket.send(Message::Binary(data.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some((rows, cols)) = parse_resize(text.as_str()) {
                        if let Err(err) = session.resize(rows, cols) {
                            debug!("terminal {id}: resize failed: {err}");
                        }
                        continue;
                    }
                    if write_to_pty(&session, text.as_bytes().to_vec()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    if write_to_pty(&session, data.to_vec()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!("terminal {id}: socket error: {err}");
                    break;
                }
            }
        }
    }

    state.terminals.close(&id);
    info!("terminal socket closed: {id}");
}

async fn write_to_pty(session: &Arc<Session>, data: Vec<u8>) -> Result<(), ()> {
    let session = session.clone();
    match tokio::task::spawn_blocking(move || session.write(&data)).await {
        Ok(Ok(())) => Ok(()),
        _ => Err(()),
    }
}

fn parse_resize(text: &str) -> Option<(u16, u16)> {
    let req: ResizeRequest = serde_json::from_str(text).ok()?;
    (req.kind == "resize").then_some((req.rows, req.cols))
}
