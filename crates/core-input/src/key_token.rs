use core_events::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::event::{
    KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyEventState as CKeyEventState, KeyModifiers as CKeyModifiers,
};

/// Map a crossterm key event into a normalized `KeyEvent`.
///
/// Returns `None` for key releases and for key codes we do not support (media keys, lone
/// modifiers, lock keys).
pub(crate) fn map_key_event(event: &CKeyEvent) -> Option<KeyEvent> {
    if matches!(event.kind, CKeyEventKind::Release) {
        return None;
    }
    let keypad = event.state.contains(CKeyEventState::KEYPAD);
    let code = map_key_code(&event.code, keypad)?;
    let mut mods = map_mods(event.modifiers);
    if let KeyCode::Char(_) = code {
        // Case already lives in the character.
        mods.remove(KeyModifiers::SHIFT);
    }
    Some(KeyEvent::new(code, mods))
}

/// Convert a crossterm key code into a normalized key code.
pub(crate) fn map_key_code(code: &CKeyCode, keypad: bool) -> Option<KeyCode> {
    let mapped = match code {
        CKeyCode::Char(c) => KeyCode::Char(*c),
        CKeyCode::Enter => KeyCode::Enter,
        CKeyCode::Esc => KeyCode::Esc,
        CKeyCode::Backspace => KeyCode::Backspace,
        CKeyCode::Tab => KeyCode::Tab,
        CKeyCode::BackTab => KeyCode::BackTab,
        CKeyCode::Up => KeyCode::Up,
        CKeyCode::Down => KeyCode::Down,
        CKeyCode::Left => KeyCode::Left,
        CKeyCode::Right => KeyCode::Right,
        CKeyCode::Home => KeyCode::Home,
        CKeyCode::End => KeyCode::End,
        CKeyCode::PageUp => KeyCode::PageUp,
        CKeyCode::PageDown => KeyCode::PageDown,
        CKeyCode::Insert => KeyCode::Insert,
        CKeyCode::Delete => KeyCode::Delete,
        CKeyCode::F(n) => KeyCode::F(*n),
        CKeyCode::Null
        | CKeyCode::CapsLock
        | CKeyCode::ScrollLock
        | CKeyCode::NumLock
        | CKeyCode::PrintScreen
        | CKeyCode::Pause
        | CKeyCode::Menu
        | CKeyCode::KeypadBegin
        | CKeyCode::Media(_)
        | CKeyCode::Modifier(_) => return None,
    };
    if keypad && let Some(alt) = mapped.keypad_alternate() {
        return Some(alt);
    }
    Some(mapped)
}

/// Convert crossterm modifier flags into `KeyModifiers`. META folds into ALT.
pub(crate) fn map_mods(mods: CKeyModifiers) -> KeyModifiers {
    let mut out = KeyModifiers::empty();
    if mods.contains(CKeyModifiers::CONTROL) {
        out |= KeyModifiers::CTRL;
    }
    if mods.intersects(CKeyModifiers::ALT | CKeyModifiers::META) {
        out |= KeyModifiers::ALT;
    }
    if mods.contains(CKeyModifiers::SHIFT) {
        out |= KeyModifiers::SHIFT;
    }
    if mods.contains(CKeyModifiers::SUPER) {
        out |= KeyModifiers::SUPER;
    }
    out
}
