//! Test utilities: mock backends and application state wiring.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use image::RgbaImage;
use tokio::sync::mpsc;

use hostlink::api::AppState;
use hostlink::auth::AuthState;
use hostlink::capture::{Bounds, CaptureError, FrameSource, JpegEncoder, MonitorInfo};
use hostlink::chat::{ChatLog, ChatMessage};
use hostlink::clipboard::{ClipboardBackend, ClipboardBridge, ClipboardError};
use hostlink::input::{InputBackend, InputError, Injector};
use hostlink::stream::StreamController;
use hostlink::terminal::Registry;
use hostlink::ws::protocol::{self, MouseButton, WireMessage};
use hostlink::ws::{Encoding, Hub};

/// Frame source over two fake monitors.
pub struct TestFrames {
    monitor_index: Mutex<usize>,
}

impl TestFrames {
    pub fn new() -> Self {
        Self {
            monitor_index: Mutex::new(0),
        }
    }

    fn bounds_of(index: usize) -> Bounds {
        match index {
            0 => Bounds {
                x: 100,
                y: 50,
                width: 1920,
                height: 1080,
            },
            _ => Bounds {
                x: 0,
                y: 0,
                width: 800,
                height: 600,
            },
        }
    }
}

impl FrameSource for TestFrames {
    fn monitors(&self) -> Vec<MonitorInfo> {
        (0..2)
            .map(|index| {
                let bounds = Self::bounds_of(index);
                MonitorInfo {
                    index,
                    name: format!("Display {}", index + 1),
                    width: bounds.width,
                    height: bounds.height,
                    primary: index == 0,
                }
            })
            .collect()
    }

    fn monitor_index(&self) -> usize {
        *self.monitor_index.lock().unwrap()
    }

    fn set_monitor(&self, index: usize) -> bool {
        if index < 2 {
            *self.monitor_index.lock().unwrap() = index;
            true
        } else {
            false
        }
    }

    fn bounds(&self) -> Result<Bounds, CaptureError> {
        Ok(Self::bounds_of(self.monitor_index()))
    }

    fn capture(&self) -> Result<RgbaImage, CaptureError> {
        Ok(RgbaImage::from_pixel(64, 48, image::Rgba([0, 128, 255, 255])))
    }
}

/// A host-input action recorded by [`RecordingInput`].
#[derive(Debug, Clone, PartialEq)]
pub enum InputAction {
    Move(i32, i32),
    Button(MouseButton, bool),
    Scroll(i32, i32),
    Key(enigo::Key, bool),
    Chord(Vec<enigo::Key>),
}

/// Input backend that records instead of injecting.
pub struct RecordingInput {
    pub actions: Arc<Mutex<Vec<InputAction>>>,
}

impl InputBackend for RecordingInput {
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        self.actions.lock().unwrap().push(InputAction::Move(x, y));
        Ok(())
    }

    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), InputError> {
        self.actions
            .lock()
            .unwrap()
            .push(InputAction::Button(button, down));
        Ok(())
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> Result<(), InputError> {
        self.actions.lock().unwrap().push(InputAction::Scroll(dx, dy));
        Ok(())
    }

    fn key(&mut self, key: enigo::Key, down: bool) -> Result<(), InputError> {
        self.actions.lock().unwrap().push(InputAction::Key(key, down));
        Ok(())
    }

    fn chord(&mut self, keys: &[enigo::Key]) -> Result<(), InputError> {
        self.actions
            .lock()
            .unwrap()
            .push(InputAction::Chord(keys.to_vec()));
        Ok(())
    }
}

/// In-memory stand-in for the host clipboard.
pub struct MemoryClipboard {
    pub text: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            text: Mutex::new(String::new()),
        })
    }

    pub fn read(&self) -> String {
        self.text.lock().unwrap().clone()
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        Ok(self.text.lock().unwrap().clone())
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        *self.text.lock().unwrap() = text.to_string();
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub actions: Arc<Mutex<Vec<InputAction>>>,
    pub host_clipboard: Arc<MemoryClipboard>,
}

/// Build an [`AppState`] on mock backends, with the hub loop running and
/// the clipboard/chat callbacks wired to the broadcast bus exactly as the
/// server wires them.
pub fn test_app() -> TestApp {
    let hub = Arc::new(Hub::new());
    tokio::spawn(hub.clone().run());

    let frames: Arc<dyn FrameSource> = Arc::new(TestFrames::new());
    let encoder = Arc::new(JpegEncoder::default());
    let stream = Arc::new(StreamController::new(hostlink::stream::DEFAULT_FPS));

    let actions: Arc<Mutex<Vec<InputAction>>> = Arc::new(Mutex::new(Vec::new()));
    let input = Arc::new(Injector::new(Box::new(RecordingInput {
        actions: actions.clone(),
    })));

    let host_clipboard = MemoryClipboard::new();
    let clip_hub = hub.clone();
    let clipboard = Arc::new(ClipboardBridge::new(
        host_clipboard.clone(),
        Arc::new(move |text: String| {
            let wire = WireMessage::ClipboardSync { text };
            clip_hub.try_broadcast(Bytes::from(protocol::encode(&wire)));
        }),
    ));

    let chat_hub = hub.clone();
    let chat = Arc::new(ChatLog::new(Some(Arc::new(move |msg: ChatMessage| {
        let wire = WireMessage::ChatMessage {
            id: msg.id,
            sender: msg.sender,
            text: msg.text,
            timestamp: msg.timestamp,
        };
        chat_hub.try_broadcast(Bytes::from(protocol::encode(&wire)));
    }))));

    let auth = AuthState::new("test-secret-for-integration-tests-32ch");

    let state = AppState::new(
        hub,
        frames,
        encoder,
        stream,
        input,
        Arc::new(Registry::new()),
        clipboard,
        chat,
        auth,
        Encoding::Jpeg,
    );

    TestApp {
        state,
        actions,
        host_clipboard,
    }
}

/// Receive and decode the next control-plane message from a client queue.
pub async fn next_message(rx: &mut mpsc::Receiver<Bytes>) -> WireMessage {
    let data = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("client queue closed");
    serde_json::from_slice(&data).expect("valid wire message")
}

/// Poll until `cond` holds or the deadline lapses.
pub async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within deadline");
}

/// Drain everything currently queued for a client.
pub fn drain(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Bytes> {
    let mut out = Vec::new();
    while let Ok(data) = rx.try_recv() {
        out.push(data);
    }
    out
}
