//! Input synthesis
//!
//! Issues mouse clicks, scrolls and key presses to the OS. Everything is
//! behind the [`InputSynthesizer`] trait so the controller can be driven
//! against a recording fake in tests.
//!
//! Coordinates are [`ScreenPoint`] only; frame-local positions must be
//! translated before they get here.

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::geometry::ScreenPoint;

/// A key press, optionally with held modifiers ("shift+1", "space", "up").
#[derive(Debug, Clone, PartialEq)]
pub struct KeySpec {
    pub modifiers: Vec<Key>,
    pub key: Key,
}

impl KeySpec {
    /// Parse a config key string like `"shift+1"`, `"space"` or `"up"`.
    pub fn parse(spec: &str) -> Result<Self, InputError> {
        let mut parts: Vec<&str> = spec.split('+').map(str::trim).collect();
        let key_part = parts
            .pop()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| InputError::BadKeySpec(spec.to_string()))?;

        let mut modifiers = Vec::new();
        for part in parts {
            modifiers.push(match part.to_lowercase().as_str() {
                "shift" => Key::Shift,
                "ctrl" | "control" => Key::Control,
                "alt" => Key::Alt,
                "meta" | "cmd" | "super" => Key::Meta,
                other => return Err(InputError::BadKeySpec(other.to_string())),
            });
        }

        let key = match key_part.to_lowercase().as_str() {
            "space" => Key::Space,
            "up" => Key::UpArrow,
            "down" => Key::DownArrow,
            "left" => Key::LeftArrow,
            "right" => Key::RightArrow,
            "enter" | "return" => Key::Return,
            "esc" | "escape" => Key::Escape,
            "tab" => Key::Tab,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Unicode(c),
                    _ => return Err(InputError::BadKeySpec(other.to_string())),
                }
            }
        };

        Ok(Self { modifiers, key })
    }
}

/// Synthesized mouse/keyboard output.
pub trait InputSynthesizer: Send {
    /// Left-click at a screen-absolute position.
    fn click(&mut self, p: ScreenPoint) -> Result<(), InputError>;
    /// Move the cursor to a screen-absolute position without clicking.
    fn move_to(&mut self, p: ScreenPoint) -> Result<(), InputError>;
    /// Scroll the wheel downwards by `lines` notches.
    fn scroll_down(&mut self, lines: i32) -> Result<(), InputError>;
    /// Press a key, holding the spec's modifiers around it.
    fn press(&mut self, key: &KeySpec) -> Result<(), InputError>;
    /// Current cursor position, used by the calibration flow.
    fn cursor_position(&mut self) -> Result<ScreenPoint, InputError>;
}

/// Production input backed by `enigo`.
///
/// On Windows enigo issues scan-code SendInput events, which the target
/// game accepts where plain virtual-key injection is ignored.
pub struct EnigoInput {
    enigo: Enigo,
}

impl EnigoInput {
    pub fn new() -> Result<Self, InputError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| InputError::Backend(e.to_string()))?;
        Ok(Self { enigo })
    }
}

impl InputSynthesizer for EnigoInput {
    fn click(&mut self, p: ScreenPoint) -> Result<(), InputError> {
        self.enigo
            .move_mouse(p.x, p.y, Coordinate::Abs)
            .map_err(|e| InputError::Backend(e.to_string()))?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn move_to(&mut self, p: ScreenPoint) -> Result<(), InputError> {
        self.enigo
            .move_mouse(p.x, p.y, Coordinate::Abs)
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn scroll_down(&mut self, lines: i32) -> Result<(), InputError> {
        self.enigo
            .scroll(lines, Axis::Vertical)
            .map_err(|e| InputError::Backend(e.to_string()))
    }

    fn press(&mut self, key: &KeySpec) -> Result<(), InputError> {
        for m in &key.modifiers {
            self.enigo
                .key(*m, Direction::Press)
                .map_err(|e| InputError::Backend(e.to_string()))?;
        }
        let result = self
            .enigo
            .key(key.key, Direction::Click)
            .map_err(|e| InputError::Backend(e.to_string()));
        // Release modifiers in reverse even if the key itself failed.
        for m in key.modifiers.iter().rev() {
            self.enigo
                .key(*m, Direction::Release)
                .map_err(|e| InputError::Backend(e.to_string()))?;
        }
        result
    }

    fn cursor_position(&mut self) -> Result<ScreenPoint, InputError> {
        let (x, y) = self
            .enigo
            .location()
            .map_err(|e| InputError::Backend(e.to_string()))?;
        Ok(ScreenPoint::new(x, y))
    }
}

/// Input synthesis errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("unrecognized key spec: {0}")]
    BadKeySpec(String),
    #[error("input backend error: {0}")]
    Backend(String),
}
