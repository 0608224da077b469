//! Discrete input events and held-key state
//!
//! The host translates DOM events into `InputEvent`s; games react to them
//! immediately (presses) and sample `HeldKeys` once per tick (movement, holds).

use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Printable key, lowercased
    Char(char),
    Space,
    Escape,
    Enter,
    Other,
}

impl Key {
    /// Map a DOM `KeyboardEvent.key` value
    pub fn from_dom(name: &str) -> Self {
        match name {
            " " | "Space" | "Spacebar" => Key::Space,
            "Escape" | "Esc" => Key::Escape,
            "Enter" => Key::Enter,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => Key::Other,
                }
            }
        }
    }

    pub fn char(&self) -> Option<char> {
        match self {
            Key::Char(c) => Some(*c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown { key: Key, repeat: bool },
    KeyUp { key: Key },
    PointerDown { pos: Vec2 },
    PointerUp { pos: Vec2 },
    PointerMove { pos: Vec2 },
}

/// Keys and pointer state as of the latest event
#[derive(Debug, Clone, Default)]
pub struct HeldKeys {
    keys: Vec<Key>,
    pointer: Vec2,
    pointer_down: bool,
}

impl HeldKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an event into the held state
    pub fn apply(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::KeyDown { key, .. } => {
                if !self.keys.contains(&key) {
                    self.keys.push(key);
                }
            }
            InputEvent::KeyUp { key } => self.keys.retain(|k| *k != key),
            InputEvent::PointerDown { pos } => {
                self.pointer = pos;
                self.pointer_down = true;
            }
            InputEvent::PointerUp { pos } => {
                self.pointer = pos;
                self.pointer_down = false;
            }
            InputEvent::PointerMove { pos } => self.pointer = pos,
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_char_held(&self, c: char) -> bool {
        self.is_held(Key::Char(c))
    }

    pub fn pointer(&self) -> Vec2 {
        self.pointer
    }

    pub fn pointer_down(&self) -> bool {
        self.pointer_down
    }

    /// Drop everything, e.g. on focus loss or restart
    pub fn clear(&mut self) {
        self.keys.clear();
        self.pointer_down = false;
    }
}
