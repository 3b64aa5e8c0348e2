//! Host clipboard bridge: polls for local changes, applies remote writes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::sync::watch;

/// How often the host clipboard is sampled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard backend: {0}")]
    Backend(String),
}

/// Access to the host clipboard. Calls may block.
pub trait ClipboardBackend: Send + Sync {
    fn read_text(&self) -> Result<String, ClipboardError>;
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// `ClipboardBackend` over the system clipboard.
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Backend(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }
}

impl ClipboardBackend for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        self.inner
            .lock()
            .unwrap()
            .get_text()
            .map_err(|e| ClipboardError::Backend(e.to_string()))
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.inner
            .lock()
            .unwrap()
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Backend(e.to_string()))
    }
}

pub type OnClipboardChange = Arc<dyn Fn(String) + Send + Sync>;

/// Watches the host clipboard and propagates changes, suppressing echoes
/// of text that arrived from a client.
pub struct ClipboardBridge {
    backend: Arc<dyn ClipboardBackend>,
    last_text: Mutex<String>,
    on_change: OnClipboardChange,
    stop_tx: watch::Sender<bool>,
}

impl ClipboardBridge {
    pub fn new(backend: Arc<dyn ClipboardBackend>, on_change: OnClipboardChange) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            backend,
            last_text: Mutex::new(String::new()),
            on_change,
            stop_tx,
        }
    }

    /// Start the 500 ms poll loop. Runs until [`ClipboardBridge::stop`].
    pub fn start_watching(self: &Arc<Self>) {
        let bridge = self.clone();
        let mut stop_rx = self.stop_tx.subscribe();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(POLL_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => return,
                    _ = tick.tick() => bridge.poll_once().await,
                }
            }
        });
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Run a single poll tick: read the host clipboard and emit a change
    /// event if the text is non-empty and differs from the cached value.
    pub async fn poll_once(&self) {
        let backend = self.backend.clone();
        let text = match tokio::task::spawn_blocking(move || backend.read_text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                debug!("clipboard read failed, skipping tick: {err}");
                return;
            }
            Err(_) => return,
        };

        let changed = {
            let mut last = self.last_text.lock().unwrap();
            if !text.is_empty() && text != *last {
                *last = text.clone();
                true
            } else {
                false
            }
        };
        if changed {
            (self.on_change)(text);
        }
    }

    /// Apply a remote clipboard write. The cache is primed before the host
    /// write so the next poll does not re-broadcast it. Empty text is
    /// ignored.
    pub async fn set_text(&self, text: String) {
        if text.is_empty() {
            return;
        }
        *self.last_text.lock().unwrap() = text.clone();
        let backend = self.backend.clone();
        match tokio::task::spawn_blocking(move || backend.write_text(&text)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("clipboard write failed: {err}"),
            Err(_) => {}
        }
    }

    /// The most recently observed or written text.
    pub fn last_text(&self) -> String {
        self.last_text.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MemoryClipboard {
        text: Mutex<String>,
    }

    impl MemoryClipboard {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                text: Mutex::new(String::new()),
            })
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

    fn bridge_with_recorder(
        backend: Arc<MemoryClipboard>,
    ) -> (Arc<ClipboardBridge>, Arc<Mutex<Vec<String>>>) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let bridge = Arc::new(ClipboardBridge::new(
            backend,
            Arc::new(move |text| recorder.lock().unwrap().push(text)),
        ));
        (bridge, seen)
    }

    #[tokio::test]
    async fn host_change_is_emitted_once() {
        let backend = MemoryClipboard::new();
        let (bridge, seen) = bridge_with_recorder(backend.clone());

        backend.write_text("copied on host").unwrap();
        bridge.poll_once().await;
        bridge.poll_once().await;

        assert_eq!(seen.lock().unwrap().as_slice(), ["copied on host"]);
    }

    #[tokio::test]
    async fn remote_write_does_not_echo() {
        let backend = MemoryClipboard::new();
        let (bridge, seen) = bridge_with_recorder(backend.clone());

        bridge.set_text("hello".to_string()).await;
        assert_eq!(backend.read_text().unwrap(), "hello");

        bridge.poll_once().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_text_is_ignored() {
        let backend = MemoryClipboard::new();
        let (bridge, seen) = bridge_with_recorder(backend.clone());

        bridge.poll_once().await;
        assert!(seen.lock().unwrap().is_empty());

        bridge.set_text(String::new()).await;
        assert_eq!(bridge.last_text(), "");

        backend.write_text("real text").unwrap();
        bridge.poll_once().await;
        assert_eq!(seen.lock().unwrap().as_slice(), ["real text"]);
    }
}
