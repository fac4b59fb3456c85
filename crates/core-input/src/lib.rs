//! Translation of crossterm terminal events into normalized `InputEvent`s.

mod key_token;

use core_events::InputEvent;
use crossterm::event::Event as CEvent;

/// Map one crossterm event. Events the launcher ignores (mouse, focus, key releases,
/// unsupported keys) map to `None`.
pub fn map_event(event: CEvent) -> Option<InputEvent> {
    match event {
        CEvent::Key(key) => key_token::map_key_event(&key).map(InputEvent::Key),
        CEvent::Resize(cols, rows) => Some(InputEvent::Resize(cols, rows)),
        CEvent::Paste(text) => {
            log_paste(&text);
            Some(InputEvent::Paste(text))
        }
        CEvent::Mouse(_) | CEvent::FocusGained | CEvent::FocusLost => None,
    }
}

#[inline]
pub(crate) fn log_paste(text: &str) {
    tracing::trace!(target: "input.paste", size_bytes = text.len(), "paste_received");
}
