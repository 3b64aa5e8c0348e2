//! The screen streaming worker: capture, encode, broadcast.
//!
//! The worker starts lazily on the first client registration and exits on
//! its own once the client set empties; the next registration restarts it.
//! The cadence is sleep-based, so a slow network fills that client's queue
//! rather than slowing the encoder down.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};

use crate::capture::{FrameSource, JpegEncoder};
use crate::ws::Hub;

pub const DEFAULT_FPS: u32 = 20;
const MIN_FPS: i64 = 5;
const MAX_FPS: i64 = 30;

/// Backoff after a failed capture or encode.
const RETRY_DELAY: Duration = Duration::from_millis(100);

struct StreamState {
    streaming: bool,
    fps: u32,
}

/// Owns the streaming flag and target frame rate.
pub struct StreamController {
    state: Mutex<StreamState>,
}

impl StreamController {
    pub fn new(fps: u32) -> Self {
        let fps = if (MIN_FPS..=MAX_FPS).contains(&(fps as i64)) {
            fps
        } else {
            DEFAULT_FPS
        };
        Self {
            state: Mutex::new(StreamState {
                streaming: false,
                fps,
            }),
        }
    }

    /// Update the target frame rate. Values outside [5, 30] are ignored.
    pub fn set_fps(&self, fps: i64) {
        if (MIN_FPS..=MAX_FPS).contains(&fps) {
            self.state.lock().unwrap().fps = fps as u32;
        }
    }

    pub fn fps(&self) -> u32 {
        self.state.lock().unwrap().fps
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().unwrap().streaming
    }

    /// Start the worker unless it is already running. The flag flips under
    /// the stream mutex so racing registrations cannot double-start it.
    pub fn start_if_needed(
        self: &Arc<Self>,
        hub: &Arc<Hub>,
        frames: &Arc<dyn FrameSource>,
        encoder: &Arc<JpegEncoder>,
    ) {
        {
            let mut state = self.state.lock().unwrap();
            if state.streaming {
                return;
            }
            state.streaming = true;
        }
        debug!("starting stream worker");
        let controller = self.clone();
        let hub = hub.clone();
        let frames = frames.clone();
        let encoder = encoder.clone();
        tokio::spawn(async move {
            run_stream(controller, hub, frames, encoder).await;
        });
    }

    fn mark_stopped(&self) {
        self.state.lock().unwrap().streaming = false;
    }
}

async fn run_stream(
    controller: Arc<StreamController>,
    hub: Arc<Hub>,
    frames: Arc<dyn FrameSource>,
    encoder: Arc<JpegEncoder>,
) {
    loop {
        if hub.client_count() == 0 {
            debug!("no clients, stopping stream worker");
            controller.mark_stopped();
            return;
        }

        let fps = controller.fps();

        let source = frames.clone();
        let frame = match tokio::task::spawn_blocking(move || source.capture()).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(err)) => {
                warn!("capture failed: {err}");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
            Err(_) => {
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        let jpeg = encoder.clone();
        let data = match tokio::task::spawn_blocking(move || jpeg.encode(&frame)).await {
            Ok(Ok(data)) => data,
            Ok(Err(err)) => {
                warn!("encode failed: {err}");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
            Err(_) => {
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        hub.broadcast(Bytes::from(data)).await;

        tokio::time::sleep(Duration::from_secs_f64(1.0 / fps as f64)).await;
    }
}
