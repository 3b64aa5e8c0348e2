//! Browser key-name translation.
//!
//! Clients report keys using the DOM `KeyboardEvent.key` alphabet. Named
//! keys are translated through a fixed table; single characters inject as
//! unicode keystrokes. Names with no host equivalent are dropped.

use enigo::Key;

use crate::ws::protocol::SpecialKey;

/// Translate a DOM key name to a host key.
pub fn map_key(name: &str) -> Option<Key> {
    let key = match name {
        "Backspace" => Key::Backspace,
        "Tab" => Key::Tab,
        "Enter" => Key::Return,
        "Shift" => Key::Shift,
        "Control" => Key::Control,
        "Alt" => Key::Alt,
        "Escape" => Key::Escape,
        "Space" | " " => Key::Space,
        "ArrowUp" => Key::UpArrow,
        "ArrowDown" => Key::DownArrow,
        "ArrowLeft" => Key::LeftArrow,
        "ArrowRight" => Key::RightArrow,
        "Delete" => Key::Delete,
        "Home" => Key::Home,
        "End" => Key::End,
        "PageUp" => Key::PageUp,
        "PageDown" => Key::PageDown,
        "F1" => Key::F1,
        "F2" => Key::F2,
        "F3" => Key::F3,
        "F4" => Key::F4,
        "F5" => Key::F5,
        "F6" => Key::F6,
        "F7" => Key::F7,
        "F8" => Key::F8,
        "F9" => Key::F9,
        "F10" => Key::F10,
        "F11" => Key::F11,
        "F12" => Key::F12,
        "CapsLock" => Key::CapsLock,
        "Meta" => Key::Meta,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return None,
            }
        }
    };
    Some(key)
}

/// The key chord injected for a special-key request.
pub fn special_chord(key: SpecialKey) -> Vec<Key> {
    match key {
        SpecialKey::CtrlAltDel => vec![Key::Control, Key::Alt, Key::Delete],
        SpecialKey::Win => vec![Key::Meta],
        SpecialKey::PrintScreen => vec![Key::Print],
    }
}
