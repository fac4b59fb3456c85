//! Chord parsing and raw-code expansion.
//!
//! A chord string is a `+` separated list of modifier tokens followed by a key name, e.g.
//! `ctrl+r`, `shift+m`, `alt+enter`, `delete`, `?`. Modifier and named-key tokens are case
//! insensitive; a single-character key keeps its case.
//!
//! Expansion rules (to normalized `KeyEvent`s):
//! * `ctrl+<char>` yields the lowercase character with `CTRL`.
//! * `shift+<char>` yields the uppercase character without a modifier flag, which is what
//!   input normalization produces for a shifted character.
//! * `alt+` adds `ALT`, `win+` adds `SUPER`, `shift+` on a named key adds `SHIFT`.
//! * Keys with a keypad twin (`delete`, `left`, `right`, `up`, `down`, `pageup`, `pagedown`)
//!   expand to two codes, the main-block key and its keypad variant.

use core_events::{KeyCode, KeyEvent, KeyModifiers};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChordError {
    #[error("empty hotkey")]
    Empty,
    #[error("unknown modifier `{modifier}` in hotkey `{chord}`")]
    UnknownModifier { chord: String, modifier: String },
    #[error("unknown key `{key}` in hotkey `{chord}`")]
    UnknownKey { chord: String, key: String },
}

/// Normalized hotkey description: modifier set plus a main-block key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    mods: KeyModifiers,
    key: KeyCode,
}

const NAMED_KEYS: &[(&str, KeyCode)] = &[
    ("delete", KeyCode::Delete),
    ("del", KeyCode::Delete),
    ("left", KeyCode::Left),
    ("right", KeyCode::Right),
    ("up", KeyCode::Up),
    ("down", KeyCode::Down),
    ("pageup", KeyCode::PageUp),
    ("pagedown", KeyCode::PageDown),
    ("home", KeyCode::Home),
    ("end", KeyCode::End),
    ("insert", KeyCode::Insert),
    ("enter", KeyCode::Enter),
    ("return", KeyCode::Enter),
    ("tab", KeyCode::Tab),
    ("esc", KeyCode::Esc),
    ("escape", KeyCode::Esc),
    ("backspace", KeyCode::Backspace),
    ("space", KeyCode::Char(' ')),
];

fn parse_key(token: &str) -> Option<KeyCode> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(c));
    }
    let lower = token.to_ascii_lowercase();
    if let Some((_, code)) = NAMED_KEYS.iter().find(|(name, _)| *name == lower) {
        return Some(*code);
    }
    let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
    (1..=24).contains(&n).then_some(KeyCode::F(n))
}

fn parse_modifier(token: &str) -> Option<KeyModifiers> {
    match token.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Some(KeyModifiers::CTRL),
        "alt" => Some(KeyModifiers::ALT),
        "shift" => Some(KeyModifiers::SHIFT),
        "win" | "super" => Some(KeyModifiers::SUPER),
        _ => None,
    }
}

impl FromStr for Chord {
    type Err = ChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChordError::Empty);
        }
        // A trailing "+" is the plus key itself ("ctrl++").
        let (head, key_token) = match s.strip_suffix("++") {
            Some(rest) => (Some(rest), "+"),
            None if s == "+" => (None, "+"),
            None => match s.rsplit_once('+') {
                Some((head, key)) => (Some(head), key),
                None => (None, s),
            },
        };
        let mut mods = KeyModifiers::empty();
        for token in head.into_iter().flat_map(|h| h.split('+')) {
            mods |= parse_modifier(token).ok_or_else(|| ChordError::UnknownModifier {
                chord: s.to_string(),
                modifier: token.to_string(),
            })?;
        }
        let key = parse_key(key_token).ok_or_else(|| ChordError::UnknownKey {
            chord: s.to_string(),
            key: key_token.to_string(),
        })?;
        Ok(Chord::new(mods, key))
    }
}

impl Chord {
    /// Build a chord, folding it into canonical form.
    pub fn new(mut mods: KeyModifiers, key: KeyCode) -> Self {
        let key = match key.without_keypad() {
            KeyCode::Char(c) if mods.contains(KeyModifiers::CTRL) => {
                KeyCode::Char(c.to_ascii_lowercase())
            }
            KeyCode::Char(c) if mods.contains(KeyModifiers::SHIFT) => {
                mods.remove(KeyModifiers::SHIFT);
                KeyCode::Char(c.to_ascii_uppercase())
            }
            other => other,
        };
        if let KeyCode::Char(_) = key {
            mods.remove(KeyModifiers::SHIFT);
        }
        Self { mods, key }
    }

    pub fn mods(&self) -> KeyModifiers {
        self.mods
    }

    pub fn key(&self) -> KeyCode {
        self.key
    }

    /// Every raw code this chord matches. Primary code first.
    pub fn raw_codes(&self) -> SmallVec<[KeyEvent; 2]> {
        let mut out = SmallVec::new();
        out.push(KeyEvent::new(self.key, self.mods));
        if let Some(alt) = self.key.keypad_alternate() {
            out.push(KeyEvent::new(alt, self.mods));
        }
        out
    }

    /// Short form used in menus: `#` win, `^` ctrl, `!` alt, `+` shift.
    pub fn abbreviation(&self) -> String {
        let mut s = String::new();
        for (flag, sym) in [
            (KeyModifiers::SUPER, '#'),
            (KeyModifiers::CTRL, '^'),
            (KeyModifiers::ALT, '!'),
            (KeyModifiers::SHIFT, '+'),
        ] {
            if self.mods.contains(flag) {
                s.push(sym);
            }
        }
        s.push_str(&key_name(self.key));
        s
    }
}

fn key_name(key: KeyCode) -> String {
    if let KeyCode::Char(' ') = key {
        return "space".to_string();
    }
    if let KeyCode::Char(c) = key {
        return c.to_string();
    }
    if let KeyCode::F(n) = key {
        return format!("f{n}");
    }
    NAMED_KEYS
        .iter()
        .find(|(_, code)| *code == key)
        .map(|(name, _)| (*name).to_string())
        .unwrap_or_else(|| format!("{key:?}").to_ascii_lowercase())
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (KeyModifiers::SUPER, "win+"),
            (KeyModifiers::CTRL, "ctrl+"),
            (KeyModifiers::ALT, "alt+"),
            (KeyModifiers::SHIFT, "shift+"),
        ] {
            if self.mods.contains(flag) {
                f.write_str(name)?;
            }
        }
        f.write_str(&key_name(self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn codes(s: &str) -> Vec<KeyEvent> {
        s.parse::<Chord>().unwrap().raw_codes().into_vec()
    }

    #[test]
    fn decode_table() {
        let table: Vec<(&str, Vec<KeyEvent>)> = vec![
            ("ctrl+r", vec![KeyEvent::ctrl('r')]),
            ("Ctrl+R", vec![KeyEvent::ctrl('r')]),
            ("shift+m", vec![KeyEvent::char('M')]),
            ("?", vec![KeyEvent::char('?')]),
            ("M", vec![KeyEvent::char('M')]),
            (
                "alt+enter",
                vec![KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT)],
            ),
            (
                "win+e",
                vec![KeyEvent::new(KeyCode::Char('e'), KeyModifiers::SUPER)],
            ),
            (
                "delete",
                vec![
                    KeyEvent::plain(KeyCode::Delete),
                    KeyEvent::plain(KeyCode::KeypadDelete),
                ],
            ),
            (
                "left",
                vec![
                    KeyEvent::plain(KeyCode::Left),
                    KeyEvent::plain(KeyCode::KeypadLeft),
                ],
            ),
            (
                "right",
                vec![
                    KeyEvent::plain(KeyCode::Right),
                    KeyEvent::plain(KeyCode::KeypadRight),
                ],
            ),
            ("f5", vec![KeyEvent::plain(KeyCode::F(5))]),
            ("space", vec![KeyEvent::char(' ')]),
            (
                "shift+tab",
                vec![KeyEvent::new(KeyCode::Tab, KeyModifiers::SHIFT)],
            ),
            (
                "ctrl++",
                vec![KeyEvent::new(KeyCode::Char('+'), KeyModifiers::CTRL)],
            ),
        ];
        for (chord, expected) in table {
            assert_eq!(codes(chord), expected, "chord {chord}");
        }
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert_eq!("".parse::<Chord>(), Err(ChordError::Empty));
        assert!(matches!(
            "hyper+x".parse::<Chord>(),
            Err(ChordError::UnknownModifier { modifier, .. }) if modifier == "hyper"
        ));
        assert!(matches!(
            "ctrl+banana".parse::<Chord>(),
            Err(ChordError::UnknownKey { key, .. }) if key == "banana"
        ));
        assert!(matches!("f99".parse::<Chord>(), Err(ChordError::UnknownKey { .. })));
    }

    #[test]
    fn display_is_canonical() {
        let c: Chord = "shift+ctrl+X".parse().unwrap();
        assert_eq!(c.to_string(), "ctrl+x");
        let c: Chord = "alt+ctrl+delete".parse().unwrap();
        assert_eq!(c.to_string(), "ctrl+alt+delete");
        assert_eq!(c.to_string().parse::<Chord>().unwrap(), c);
    }

    #[test]
    fn abbreviation_uses_symbols() {
        let abbr = |s: &str| s.parse::<Chord>().unwrap().abbreviation();
        assert_eq!(abbr("ctrl+r"), "^r");
        assert_eq!(abbr("win+alt+k"), "#!k");
        assert_eq!(abbr("shift+m"), "M");
        assert_eq!(abbr("shift+up"), "+up");
    }
}
