//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::AuthState;
use crate::capture::{FrameSource, JpegEncoder};
use crate::chat::ChatLog;
use crate::clipboard::ClipboardBridge;
use crate::input::Injector;
use crate::stream::StreamController;
use crate::terminal::Registry;
use crate::ws::{Encoding, Hub};

/// Everything a handler can reach. Cheap to clone; all components are
/// shared behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub frames: Arc<dyn FrameSource>,
    pub encoder: Arc<JpegEncoder>,
    pub stream: Arc<StreamController>,
    pub input: Arc<Injector>,
    pub terminals: Arc<Registry>,
    pub clipboard: Arc<ClipboardBridge>,
    pub chat: Arc<ChatLog>,
    pub auth: AuthState,
    /// Encoding advertised in `screen_info`, fixed at startup by the
    /// hardware probe.
    pub encoding: Encoding,
}

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        hub: Arc<Hub>,
        frames: Arc<dyn FrameSource>,
        encoder: Arc<JpegEncoder>,
        stream: Arc<StreamController>,
        input: Arc<Injector>,
        terminals: Arc<Registry>,
        clipboard: Arc<ClipboardBridge>,
        chat: Arc<ChatLog>,
        auth: AuthState,
        encoding: Encoding,
    ) -> Self {
        Self {
            hub,
            frames,
            encoder,
            stream,
            input,
            terminals,
            clipboard,
            chat,
            auth,
            encoding,
        }
    }
}
