//! Wire protocol for all WebSocket connections.
//!
//! Every control-plane message is a JSON object whose `type` field selects
//! one of a closed set of tags. Screen frames travel as raw binary frames
//! with no header; the client learns the encoding from `screen_info`.

use serde::{Deserialize, Serialize};

use crate::capture::MonitorInfo;

/// Frame encoding advertised to clients in `screen_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Jpeg,
    H264,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Jpeg => write!(f, "jpeg"),
            Encoding::H264 => write!(f, "h264"),
        }
    }
}

/// Mouse button named by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Center,
}

/// Mouse action carried by a `mouse_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseAction {
    Move,
    Down,
    Up,
    Scroll,
}

/// Key transition carried by a `keyboard_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Down,
    Up,
}

/// Modifier state reported alongside a keyboard event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyModifiers {
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub meta: bool,
}

/// Host key chords requestable as a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialKey {
    CtrlAltDel,
    Win,
    PrintScreen,
}

/// The tagged message union spoken on every socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    MouseEvent {
        x: f64,
        y: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        button: Option<MouseButton>,
        action: MouseAction,
        #[serde(rename = "scrollX", default, skip_serializing_if = "Option::is_none")]
        scroll_x: Option<f64>,
        #[serde(rename = "scrollY", default, skip_serializing_if = "Option::is_none")]
        scroll_y: Option<f64>,
    },
    KeyboardEvent {
        key: String,
        #[serde(default)]
        code: String,
        action: KeyAction,
        #[serde(default)]
        modifiers: KeyModifiers,
    },
    ScreenInfo {
        width: u32,
        height: u32,
        #[serde(rename = "monitorIndex")]
        monitor_index: usize,
        encoding: Encoding,
    },
    MonitorList {
        monitors: Vec<MonitorInfo>,
    },
    MonitorSwitch {
        index: usize,
    },
    ConfigUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fps: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quality: Option<i64>,
    },
    ControlRequest,
    ControlGrant {
        granted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        controller: Option<String>,
    },
    ClipboardSync {
        text: String,
    },
    Stats {
        bandwidth: f64,
        fps: f64,
        encoding: String,
    },
    SpecialKey {
        key: SpecialKey,
    },
    ChatMessage {
        id: String,
        sender: String,
        text: String,
        timestamp: i64,
    },
    Ping {
        timestamp: i64,
    },
    Pong {
        timestamp: i64,
    },
}

/// Serialize a message to its JSON wire form.
///
/// The schema contains no unserializable values, so failure here would be a
/// programming error; it degrades to an empty payload which every receiver
/// drops as malformed.
pub fn encode(msg: &WireMessage) -> Vec<u8> {
    serde_json::to_vec(msg).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: WireMessage) {
        let data = encode(&msg);
        let back: WireMessage = serde_json::from_slice(&data).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn mouse_event_round_trip() {
        round_trip(WireMessage::MouseEvent {
            x: 0.5,
            y: 0.25,
            button: Some(MouseButton::Left),
            action: MouseAction::Down,
            scroll_x: None,
            scroll_y: None,
        });
        round_trip(WireMessage::MouseEvent {
            x: 0.0,
            y: 1.0,
            button: None,
            action: MouseAction::Scroll,
            scroll_x: Some(-3.0),
            scroll_y: Some(2.0),
        });
    }

    #[test]
    fn keyboard_event_round_trip() {
        round_trip(WireMessage::KeyboardEvent {
            key: "ArrowLeft".into(),
            code: "ArrowLeft".into(),
            action: KeyAction::Up,
            modifiers: KeyModifiers {
                ctrl: true,
                ..Default::default()
            },
        });
    }

    #[test]
    fn control_messages_round_trip() {
        round_trip(WireMessage::ControlRequest);
        round_trip(WireMessage::ControlGrant {
            granted: true,
            controller: Some("alice".into()),
        });
        round_trip(WireMessage::ControlGrant {
            granted: false,
            controller: None,
        });
    }

    #[test]
    fn screen_messages_round_trip() {
        round_trip(WireMessage::ScreenInfo {
            width: 1920,
            height: 1080,
            monitor_index: 1,
            encoding: Encoding::Jpeg,
        });
        round_trip(WireMessage::MonitorSwitch { index: 2 });
        round_trip(WireMessage::ConfigUpdate {
            fps: Some(15),
            quality: None,
        });
    }

    #[test]
    fn misc_messages_round_trip() {
        round_trip(WireMessage::ClipboardSync {
            text: "hello".into(),
        });
        round_trip(WireMessage::SpecialKey {
            key: SpecialKey::CtrlAltDel,
        });
        round_trip(WireMessage::ChatMessage {
            id: "m1".into(),
            sender: "bob".into(),
            text: "hi".into(),
            timestamp: 1_700_000_000_000,
        });
        round_trip(WireMessage::Ping { timestamp: 42 });
        round_trip(WireMessage::Pong { timestamp: 42 });
        round_trip(WireMessage::Stats {
            bandwidth: 1024.0,
            fps: 20.0,
            encoding: "jpeg".into(),
        });
    }

    #[test]
    fn tags_use_snake_case() {
        let data = encode(&WireMessage::ControlRequest);
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["type"], "control_request");

        let data = encode(&WireMessage::SpecialKey {
            key: SpecialKey::PrintScreen,
        });
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["key"], "print_screen");
    }

    #[test]
    fn scroll_fields_use_camel_case() {
        let data = encode(&WireMessage::MouseEvent {
            x: 0.1,
            y: 0.2,
            button: None,
            action: MouseAction::Scroll,
            scroll_x: Some(1.0),
            scroll_y: Some(-1.0),
        });
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["scrollX"], 1.0);
        assert_eq!(value["scrollY"], -1.0);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = serde_json::from_slice::<WireMessage>(br#"{"type":"bogus"}"#);
        assert!(err.is_err());
    }
}
