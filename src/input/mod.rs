//! Host input injection from logical protocol commands.

pub mod keymap;

use std::sync::Mutex;

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use log::debug;
use thiserror::Error;

use crate::capture::Bounds;
use crate::ws::protocol::{KeyAction, MouseAction, MouseButton, SpecialKey, WireMessage};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input backend: {0}")]
    Backend(String),
}

/// Host-side event synthesis. One implementation talks to the real input
/// stack; tests substitute a recorder.
pub trait InputBackend: Send {
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<(), InputError>;
    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), InputError>;
    fn scroll(&mut self, dx: i32, dy: i32) -> Result<(), InputError>;
    fn key(&mut self, key: Key, down: bool) -> Result<(), InputError>;
    /// Press every key in order, release in reverse.
    fn chord(&mut self, keys: &[Key]) -> Result<(), InputError>;
}

/// Map a normalized [0,1]² position onto a monitor's pixel grid.
pub fn monitor_point(bounds: &Bounds, x: f64, y: f64) -> (i32, i32) {
    let px = bounds.x + (x * bounds.width as f64) as i32;
    let py = bounds.y + (y * bounds.height as f64) as i32;
    (px, py)
}

/// Stateless translator from wire messages to backend calls.
pub struct Injector {
    backend: Mutex<Box<dyn InputBackend>>,
}

impl Injector {
    pub fn new(backend: Box<dyn InputBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Apply a `mouse_event` against the given monitor bounds.
    pub fn mouse_event(&self, bounds: &Bounds, msg: &WireMessage) -> Result<(), InputError> {
        let WireMessage::MouseEvent {
            x,
            y,
            button,
            action,
            scroll_x,
            scroll_y,
        } = msg
        else {
            return Ok(());
        };
        let (px, py) = monitor_point(bounds, *x, *y);
        let button = button.unwrap_or(MouseButton::Left);
        let mut backend = self.backend.lock().unwrap();
        match action {
            MouseAction::Move => backend.mouse_move(px, py),
            MouseAction::Down => {
                backend.mouse_move(px, py)?;
                backend.button(button, true)
            }
            MouseAction::Up => {
                backend.mouse_move(px, py)?;
                backend.button(button, false)
            }
            MouseAction::Scroll => backend.scroll(
                scroll_x.unwrap_or(0.0) as i32,
                scroll_y.unwrap_or(0.0) as i32,
            ),
        }
    }

    /// Apply a `keyboard_event`.
    pub fn keyboard_event(&self, key_name: &str, action: KeyAction) -> Result<(), InputError> {
        let Some(key) = keymap::map_key(key_name) else {
            debug!("no host mapping for key {key_name:?}, dropping");
            return Ok(());
        };
        let down = matches!(action, KeyAction::Down);
        self.backend.lock().unwrap().key(key, down)
    }

    /// Dispatch a `special_key` chord.
    pub fn special_key(&self, key: SpecialKey) -> Result<(), InputError> {
        let keys = keymap::special_chord(key);
        self.backend.lock().unwrap().chord(&keys)
    }
}

/// `InputBackend` over the platform input API.
pub struct EnigoBackend {
    enigo: Enigo,
}

impl EnigoBackend {
    pub fn new() -> Result<Self, InputError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InputError::Backend(e.to_string()))?;
        Ok(Self { enigo })
    }
}

fn host_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Center => Button::Middle,
    }
}

fn direction(down: bool) -> Direction {
    if down {
        Direction::Press
    } else {
        Direction::Release
    }
}

impl InputBackend for EnigoBackend {
    fn mouse_move(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), InputError> {
        self.enigo
            .button(host_button(button), direction(down))
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn scroll(&mut self, dx: i32, dy: i32) -> Result<(), InputError> {
        if dx != 0 {
            self.enigo
                .scroll(dx, Axis::Horizontal)
                .map_err(|e| InputError::Backend(e.to_string()))?;
        }
        if dy != 0 {
            self.enigo
                .scroll(dy, Axis::Vertical)
                .map_err(|e| InputError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    fn key(&mut self, key: Key, down: bool) -> Result<(), InputError> {
        self.enigo
            .key(key, direction(down))
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn chord(&mut self, keys: &[Key]) -> Result<(), InputError> {
        for key in keys {
            self.enigo
                .key(*key, Direction::Press)
                .map_err(|e| InputError::Backend(e.to_string()))?;
        }
        for key in keys.iter().rev() {
            self.enigo
                .key(*key, Direction::Release)
                .map_err(|e| InputError::Backend(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_point_scales_and_offsets() {
        let bounds = Bounds {
            x: 100,
            y: 50,
            width: 1920,
            height: 1080,
        };
        assert_eq!(monitor_point(&bounds, 0.5, 0.5), (100 + 960, 50 + 540));
        assert_eq!(monitor_point(&bounds, 0.0, 0.0), (100, 50));
        assert_eq!(monitor_point(&bounds, 1.0, 1.0), (100 + 1920, 50 + 1080));
    }
}
