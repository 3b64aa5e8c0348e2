//! The `/ws/screen` endpoint: control plane plus screen frame sink.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, info};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::AuthError;
use crate::ws::hub::Client;
use crate::ws::protocol;

use super::dispatch;
use super::error::ApiError;
use super::state::AppState;
use super::TokenQuery;

/// Protocol-level ping cadence on the write side.
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Deadline for any single socket write.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);
/// Inbound silence tolerated before the client is considered dead.
const READ_DEADLINE: Duration = Duration::from_secs(60);

/// GET /ws/screen
pub async fn screen_ws(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let token = query.token.as_deref().ok_or(AuthError::MissingToken)?;
    let claims = state.auth.validate_token(token)?;
    Ok(ws.on_upgrade(move |socket| handle_screen_socket(state, claims.username, socket)))
}

async fn handle_screen_socket(state: AppState, username: String, socket: WebSocket) {
    let (client, outbound_rx) = Client::new(Uuid::new_v4().to_string(), username);
    let client_id = client.id.clone();

    // Queue the screen description ahead of registration so it reaches the
    // client before any broadcast frame does.
    if let Some(msg) = dispatch::screen_info(&state) {
        client.try_queue(Bytes::from(protocol::encode(&msg)));
    }
    client.try_queue(Bytes::from(protocol::encode(&dispatch::monitor_list(
        &state,
    ))));

    state.hub.register(client).await;
    state
        .stream
        .start_if_needed(&state.hub, &state.frames, &state.encoder);

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_pump(sink, outbound_rx));

    read_pump(&state, &client_id, stream).await;

    state.hub.unregister(&client_id);
    let _ = writer.await;
    info!("screen socket closed for {client_id}");
}

/// Drain the outbound queue onto the socket. JSON payloads (first byte
/// `{`) go out as text frames, everything else as binary, so the control
/// and media planes share one queue in submission order.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Bytes>,
) {
    let start = tokio::time::Instant::now() + PING_INTERVAL;
    let mut ping = tokio::time::interval_at(start, PING_INTERVAL);

    loop {
        tokio::select! {
            item = outbound.recv() => match item {
                Some(data) => {
                    let msg = frame_for(data);
                    match tokio::time::timeout(WRITE_TIMEOUT, sink.send(msg)).await {
                        Ok(Ok(())) => {}
                        _ => break,
                    }
                }
                None => {
                    // Queue closed: the hub dropped this client.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                match tokio::time::timeout(WRITE_TIMEOUT, sink.send(Message::Ping(Vec::new().into()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }
    let _ = sink.close().await;
}

/// Choose the WebSocket frame type by sniffing the payload's first byte.
pub(crate) fn frame_for(data: Bytes) -> Message {
    if data.first() == Some(&b'{') {
        match String::from_utf8(data.to_vec()) {
            Ok(text) => Message::Text(text.into()),
            Err(_) => Message::Binary(data),
        }
    } else {
        Message::Binary(data)
    }
}

/// Read inbound frames under the read deadline, dispatching text payloads.
/// Any received frame, pongs included, extends the deadline.
async fn read_pump(
    state: &AppState,
    client_id: &str,
    mut stream: futures::stream::SplitStream<WebSocket>,
) {
    loop {
        match tokio::time::timeout(READ_DEADLINE, stream.next()).await {
            Err(_) => {
                debug!("read deadline lapsed for {client_id}");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!("socket error for {client_id}: {err}");
                break;
            }
            Ok(Some(Ok(msg))) => match msg {
                Message::Text(text) => {
                    dispatch::handle_message(state, client_id, text.as_bytes()).await;
                }
                // The media plane is outbound-only.
                Message::Binary(_) => {}
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Close(_) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payloads_become_text_frames() {
        let msg = frame_for(Bytes::from_static(b"{\"type\":\"ping\",\"timestamp\":1}"));
        assert!(matches!(msg, Message::Text(_)));
    }

    #[test]
    fn binary_payloads_become_binary_frames() {
        let msg = frame_for(Bytes::from_static(&[0xFF, 0xD8, 0xFF]));
        assert!(matches!(msg, Message::Binary(_)));
        let msg = frame_for(Bytes::new());
        assert!(matches!(msg, Message::Binary(_)));
    }
}
