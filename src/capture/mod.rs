//! Screen capture: monitor enumeration and frame grabbing.

pub mod encoder;
pub mod h264;

use std::sync::Mutex;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use xcap::Monitor;

pub use encoder::JpegEncoder;

/// One attached display, as reported to clients in `monitor_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorInfo {
    pub index: usize,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub primary: bool,
}

/// Pixel bounds of a monitor in the global desktop coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no monitor at index {0}")]
    NoMonitor(usize),

    #[error("captured frame has inconsistent dimensions")]
    BufferSize,

    #[error("capture backend: {0}")]
    Backend(#[from] xcap::XCapError),
}

/// Source of screen frames. The implementation owns the selected monitor
/// index; all methods are callable from blocking worker threads.
pub trait FrameSource: Send + Sync {
    /// Enumerate attached monitors. Empty on enumeration failure.
    fn monitors(&self) -> Vec<MonitorInfo>;

    /// Index of the currently selected monitor.
    fn monitor_index(&self) -> usize;

    /// Select a monitor. Out-of-range indices are ignored; returns whether
    /// the selection changed.
    fn set_monitor(&self, index: usize) -> bool;

    /// Bounds of the currently selected monitor.
    fn bounds(&self) -> Result<Bounds, CaptureError>;

    /// Grab one frame of the currently selected monitor.
    fn capture(&self) -> Result<RgbaImage, CaptureError>;
}

/// `FrameSource` over the platform capture API.
pub struct ScreenCapturer {
    monitor_index: Mutex<usize>,
}

impl ScreenCapturer {
    pub fn new() -> Self {
        Self {
            monitor_index: Mutex::new(0),
        }
    }

    fn selected(&self) -> Result<Monitor, CaptureError> {
        let index = self.monitor_index();
        let monitors = Monitor::all()?;
        monitors
            .into_iter()
            .nth(index)
            .ok_or(CaptureError::NoMonitor(index))
    }
}

impl Default for ScreenCapturer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for ScreenCapturer {
    fn monitors(&self) -> Vec<MonitorInfo> {
        let monitors = match Monitor::all() {
            Ok(monitors) => monitors,
            Err(err) => {
                log::warn!("monitor enumeration failed: {err}");
                return Vec::new();
            }
        };
        monitors
            .iter()
            .enumerate()
            .map(|(index, m)| MonitorInfo {
                index,
                name: m.name().to_string(),
                width: m.width(),
                height: m.height(),
                primary: m.is_primary(),
            })
            .collect()
    }

    fn monitor_index(&self) -> usize {
        *self.monitor_index.lock().unwrap()
    }

    fn set_monitor(&self, index: usize) -> bool {
        let count = Monitor::all().map(|m| m.len()).unwrap_or(0);
        if index < count {
            *self.monitor_index.lock().unwrap() = index;
            true
        } else {
            false
        }
    }

    fn bounds(&self) -> Result<Bounds, CaptureError> {
        let monitor = self.selected()?;
        Ok(Bounds {
            x: monitor.x(),
            y: monitor.y(),
            width: monitor.width(),
            height: monitor.height(),
        })
    }

    fn capture(&self) -> Result<RgbaImage, CaptureError> {
        let monitor = self.selected()?;
        let captured = monitor.capture_image()?;
        let (width, height) = (captured.width(), captured.height());
        // The backend hands out its own buffer type; frames leave this
        // module as our RgbaImage.
        RgbaImage::from_raw(width, height, captured.into_raw()).ok_or(CaptureError::BufferSize)
    }
}
