//! Pointer and keyboard events fed to the canvas.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Pressure reported for devices without a pressure sensor.
pub const DEFAULT_PRESSURE: f64 = 0.5;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// Pointer event in device coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
        pressure: f64,
    },
    Move {
        position: Point,
        pressure: f64,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    /// The platform aborted the gesture (touch cancel, lost capture).
    Cancel,
    /// The pointer left the canvas.
    Leave,
    /// Wheel or trackpad scroll.
    Wheel { delta: Vec2 },
}

impl PointerEvent {
    /// Left-button press without pressure data.
    pub fn down(x: f64, y: f64) -> Self {
        PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
            pressure: DEFAULT_PRESSURE,
        }
    }

    pub fn move_to(x: f64, y: f64) -> Self {
        PointerEvent::Move {
            position: Point::new(x, y),
            pressure: DEFAULT_PRESSURE,
        }
    }

    pub fn up(x: f64, y: f64) -> Self {
        PointerEvent::Up {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }
}

/// Keys the canvas reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Delete,
    Backspace,
    Escape,
    /// A printable key, lower-cased.
    Char(char),
    /// Anything else, by its DOM key name.
    Other(String),
}

impl Key {
    /// Parse a DOM `KeyboardEvent.key` value.
    pub fn parse(name: &str) -> Self {
        match name {
            "Delete" => Key::Delete,
            "Backspace" => Key::Backspace,
            "Escape" | "Esc" => Key::Escape,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c.to_ascii_lowercase()),
                    _ => Key::Other(name.to_string()),
                }
            }
        }
    }
}

/// A key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Key press without modifiers.
    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::default())
    }

    /// `Ctrl`/`Cmd` chord with `c`, optionally with shift.
    pub fn command(c: char, shift: bool) -> Self {
        Self::new(
            Key::Char(c),
            Modifiers {
                ctrl: true,
                shift,
                ..Modifiers::default()
            },
        )
    }
}
