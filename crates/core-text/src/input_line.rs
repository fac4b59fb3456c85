//! Single-line editable text with a caret.
//!
//! The caret is a character index, `0 <= caret <= text.chars().count()`. In ASCII-only mode
//! non-ASCII characters are dropped silently.

use crate::width::display_width;
use core_events::{KeyCode, KeyEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputLine {
    label: String,
    text: String,
    caret: usize,
    ascii_only: bool,
}

impl InputLine {
    pub fn new(label: impl Into<String>, text: impl Into<String>, ascii_only: bool) -> Self {
        let mut line = Self {
            label: label.into(),
            ascii_only,
            ..Self::default()
        };
        line.set_text(text);
        line
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn caret_pos(&self) -> usize {
        self.caret
    }

    pub fn ascii_only(&self) -> bool {
        self.ascii_only
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn byte_at(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len())
    }

    /// Replace the text and move the caret to the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.caret = self.char_len();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.caret = 0;
    }

    /// Insert at the caret. Returns false when the character was rejected.
    pub fn insert(&mut self, c: char) -> bool {
        if self.ascii_only && !c.is_ascii() {
            return false;
        }
        let at = self.byte_at(self.caret);
        self.text.insert(at, c);
        self.caret += 1;
        true
    }

    /// Insert a pasted string; line breaks and rejected characters are dropped.
    pub fn insert_str(&mut self, s: &str) {
        for c in s.chars().filter(|c| !c.is_control()) {
            self.insert(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.caret == 0 {
            return;
        }
        let at = self.byte_at(self.caret - 1);
        self.text.remove(at);
        self.caret -= 1;
    }

    pub fn move_left(&mut self) {
        self.caret = self.caret.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.caret = (self.caret + 1).min(self.char_len());
    }

    pub fn move_home(&mut self) {
        self.caret = 0;
    }

    pub fn move_end(&mut self) {
        self.caret = self.char_len();
    }

    /// Apply an editing key. Returns true when the key was an editing key, whether or not the
    /// text changed.
    pub fn apply_key(&mut self, key: &KeyEvent) -> bool {
        if key.is_ctrl_char('a') {
            self.clear();
            return true;
        }
        if let Some(c) = key.printable() {
            self.insert(c);
            return true;
        }
        if !key.mods.is_empty() {
            return false;
        }
        match key.code.without_keypad() {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Home => self.move_home(),
            KeyCode::End => self.move_end(),
            KeyCode::Backspace => self.backspace(),
            _ => return false,
        }
        true
    }

    /// Column where the text starts: one cell after a non-empty label.
    pub fn text_col(&self) -> usize {
        if self.label.is_empty() {
            0
        } else {
            display_width(&self.label) + 1
        }
    }

    /// Screen column of the caret.
    pub fn cursor_col(&self) -> usize {
        let before: String = self.text.chars().take(self.caret).collect();
        self.text_col() + display_width(&before)
    }
}
