//! Inbound message dispatch for the screen control plane.
//!
//! Messages arrive here from a client's read pump. Tags that mutate host
//! state are gated on the controller check; malformed payloads are dropped
//! without disconnecting the sender.

use bytes::Bytes;
use log::{debug, warn};

use crate::ws::protocol::{self, WireMessage};

use super::state::AppState;

/// Handle one inbound control-plane message from `client_id`.
pub async fn handle_message(state: &AppState, client_id: &str, data: &[u8]) {
    let msg: WireMessage = match serde_json::from_slice(data) {
        Ok(msg) => msg,
        Err(err) => {
            debug!("dropping malformed message from {client_id}: {err}");
            return;
        }
    };

    match msg {
        WireMessage::Ping { timestamp } => {
            let pong = protocol::encode(&WireMessage::Pong { timestamp });
            state.hub.send_to(client_id, Bytes::from(pong));
        }

        msg @ WireMessage::MouseEvent { .. } => {
            if !state.hub.is_controller(client_id) {
                return;
            }
            let bounds = match state.frames.bounds() {
                Ok(bounds) => bounds,
                Err(err) => {
                    warn!("monitor bounds unavailable, dropping mouse event: {err}");
                    return;
                }
            };
            let injector = state.input.clone();
            let result =
                tokio::task::spawn_blocking(move || injector.mouse_event(&bounds, &msg)).await;
            if let Ok(Err(err)) = result {
                warn!("mouse injection failed: {err}");
            }
        }

        WireMessage::KeyboardEvent { key, action, .. } => {
            if !state.hub.is_controller(client_id) {
                return;
            }
            let injector = state.input.clone();
            let result =
                tokio::task::spawn_blocking(move || injector.keyboard_event(&key, action)).await;
            if let Ok(Err(err)) = result {
                warn!("keyboard injection failed: {err}");
            }
        }

        WireMessage::SpecialKey { key } => {
            if !state.hub.is_controller(client_id) {
                return;
            }
            let injector = state.input.clone();
            let result = tokio::task::spawn_blocking(move || injector.special_key(key)).await;
            if let Ok(Err(err)) = result {
                warn!("special key injection failed: {err}");
            }
        }

        WireMessage::MonitorSwitch { index } => {
            state.frames.set_monitor(index);
            send_screen_info(state, client_id);
        }

        WireMessage::ConfigUpdate { fps, quality } => {
            if let Some(fps) = fps {
                state.stream.set_fps(fps);
            }
            if let Some(quality) = quality {
                state.encoder.set_quality(quality);
            }
        }

        WireMessage::ControlRequest => {
            state.hub.request_control(client_id).await;
        }

        WireMessage::ClipboardSync { text } => {
            state.clipboard.set_text(text).await;
        }

        // Outbound-only tags arriving inbound carry no meaning.
        _ => {}
    }
}

/// Send the current `screen_info` to one client.
pub fn send_screen_info(state: &AppState, client_id: &str) {
    if let Some(msg) = screen_info(state) {
        state.hub.send_to(client_id, Bytes::from(protocol::encode(&msg)));
    }
}

/// Build the `screen_info` message for the selected monitor.
pub fn screen_info(state: &AppState) -> Option<WireMessage> {
    let bounds = match state.frames.bounds() {
        Ok(bounds) => bounds,
        Err(err) => {
            warn!("monitor bounds unavailable: {err}");
            return None;
        }
    };
    Some(WireMessage::ScreenInfo {
        width: bounds.width,
        height: bounds.height,
        monitor_index: state.frames.monitor_index(),
        encoding: state.encoding,
    })
}

/// Build the `monitor_list` message.
pub fn monitor_list(state: &AppState) -> WireMessage {
    WireMessage::MonitorList {
        monitors: state.frames.monitors(),
    }
}
