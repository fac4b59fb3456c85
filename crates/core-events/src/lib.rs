//! Normalized input vocabulary shared by every scriptdeck crate.
//!
//! The terminal backend reports keys in whatever shape the platform produces; `core-input`
//! folds those into the small set of values defined here. Everything downstream (hotkey
//! registry, menu controller, screens) compares against these values only, so a `KeyEvent`
//! is the "raw input code" a chord decodes to.
//!
//! Invariants:
//! * Printable characters carry their case in the `char`; `KeyModifiers::SHIFT` is never set
//!   together with `KeyCode::Char`.
//! * Keys pressed on a numeric keypad (when the terminal reports them distinctly) use the
//!   `Keypad*` variants. Consumers that do not care about the distinction use
//!   [`KeyCode::without_keypad`].

use std::fmt;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct KeyModifiers: u8 {
        const CTRL  = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const SHIFT = 0b0000_0100;
        const SUPER = 0b0000_1000;
    }
}

/// Logical key identity after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyCode {
    Char(char),
    Enter,
    Esc,
    Backspace,
    Tab,
    BackTab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    F(u8),
    KeypadUp,
    KeypadDown,
    KeypadLeft,
    KeypadRight,
    KeypadPageUp,
    KeypadPageDown,
    KeypadDelete,
}

impl KeyCode {
    /// Map keypad variants onto their main-block equivalents.
    pub fn without_keypad(self) -> KeyCode {
        match self {
            KeyCode::KeypadUp => KeyCode::Up,
            KeyCode::KeypadDown => KeyCode::Down,
            KeyCode::KeypadLeft => KeyCode::Left,
            KeyCode::KeypadRight => KeyCode::Right,
            KeyCode::KeypadPageUp => KeyCode::PageUp,
            KeyCode::KeypadPageDown => KeyCode::PageDown,
            KeyCode::KeypadDelete => KeyCode::Delete,
            other => other,
        }
    }

    /// Keypad twin of a main-block key, if the key has one.
    pub fn keypad_alternate(self) -> Option<KeyCode> {
        match self {
            KeyCode::Up => Some(KeyCode::KeypadUp),
            KeyCode::Down => Some(KeyCode::KeypadDown),
            KeyCode::Left => Some(KeyCode::KeypadLeft),
            KeyCode::Right => Some(KeyCode::KeypadRight),
            KeyCode::PageUp => Some(KeyCode::KeypadPageUp),
            KeyCode::PageDown => Some(KeyCode::KeypadPageDown),
            KeyCode::Delete => Some(KeyCode::KeypadDelete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub mods: KeyModifiers,
}

impl KeyEvent {
    pub const fn new(code: KeyCode, mods: KeyModifiers) -> Self {
        Self { code, mods }
    }

    /// Key without modifiers.
    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::empty())
    }

    /// Printable character without modifiers.
    pub const fn char(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }

    /// Control chord for a character (`ctrl+a` etc.). The character is lowercased so that the
    /// result matches what terminals report for the chord.
    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c.to_ascii_lowercase()), KeyModifiers::CTRL)
    }

    pub fn is_ctrl_char(&self, c: char) -> bool {
        self.mods == KeyModifiers::CTRL && self.code == KeyCode::Char(c)
    }

    /// Printable character that can be inserted into a text field as-is.
    pub fn printable(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(c) if !c.is_control() && (self.mods - KeyModifiers::SHIFT).is_empty() => {
                Some(c)
            }
            _ => None,
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.code, self.mods)
    }
}

/// Normalized input events produced by a terminal surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key(KeyEvent),
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Bracketed paste payload. Never logged verbatim; callers log the length only.
    Paste(String),
}

impl From<KeyEvent> for InputEvent {
    fn from(key: KeyEvent) -> Self {
        InputEvent::Key(key)
    }
}
