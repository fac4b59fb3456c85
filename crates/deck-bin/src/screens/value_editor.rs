//! Single value entry, with MRU suggestions for variables and config values or bare for
//! names typed once.

use anyhow::Result;
use core_events::{KeyCode, KeyEvent};
use core_menu::{Menu, MenuDelegate, MenuOptions};
use core_state::KeyedHistoryFile;
use core_terminal::TerminalSession;
use tracing::{debug, warn};

/// Rejects a candidate value with a message for the status line.
pub type Validator<'a> = dyn Fn(&str) -> Result<(), String> + 'a;

struct ValueEditor<'a> {
    store: Option<&'a mut KeyedHistoryFile>,
    key: &'a str,
    validate: &'a Validator<'a>,
    accepted: Option<String>,
}

impl ValueEditor<'_> {
    fn accept(&mut self, menu: &mut Menu<String>) -> Result<()> {
        let value = if menu.text().is_empty() {
            match menu.selected_item() {
                Some(v) => v.clone(),
                None => return Ok(()),
            }
        } else {
            menu.text().to_string()
        };
        if let Err(msg) = (self.validate)(&value) {
            debug!(target: "menu", key = self.key, "value_rejected");
            menu.set_message(msg);
            return Ok(());
        }
        if let Some(store) = self.store.as_deref_mut() {
            store.push(self.key, &value)?;
        }
        self.accepted = Some(value);
        menu.close();
        Ok(())
    }

    fn forget_selected(&mut self, menu: &mut Menu<String>) -> Result<()> {
        let Some(store) = self.store.as_deref_mut() else {
            return Ok(());
        };
        let Some(value) = menu.selected_item().cloned() else {
            return Ok(());
        };
        let row = menu.selected_row();
        if store.remove(self.key, &value)? {
            menu.set_items(store.values(self.key).to_vec());
            menu.request_selection(row);
        } else {
            warn!(target: "state.persist", key = self.key, "suggestion_missing");
        }
        Ok(())
    }
}

impl MenuDelegate<String, ()> for ValueEditor<'_> {
    fn on_key(
        &mut self,
        menu: &mut Menu<String>,
        _term: &mut TerminalSession,
        key: &KeyEvent,
    ) -> Result<bool> {
        if !key.mods.is_empty() {
            return Ok(false);
        }
        match key.code.without_keypad() {
            KeyCode::Enter => self.accept(menu)?,
            KeyCode::Delete => self.forget_selected(menu)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Prompt for a value of `key`, offering the values stored under it. The accepted value is
/// pushed to the front of the store. Returns `None` when cancelled.
pub fn edit_value(
    term: &mut TerminalSession,
    store: &mut KeyedHistoryFile,
    key: &str,
    options: MenuOptions,
    validate: &Validator<'_>,
) -> Result<Option<String>> {
    let items = store.values(key).to_vec();
    let mut menu: Menu<String> = Menu::new(items, options);
    let mut editor = ValueEditor {
        store: Some(store),
        key,
        validate,
        accepted: None,
    };
    menu.exec(term, &mut editor)?;
    Ok(editor.accepted)
}

/// Prompt for free text with no suggestions. Enter on an empty line does nothing; the
/// prompt stays open until a value passes `validate` or it is cancelled (`None`).
pub fn prompt_text(
    term: &mut TerminalSession,
    options: MenuOptions,
    validate: &Validator<'_>,
) -> Result<Option<String>> {
    let label = options.label.clone();
    let mut menu: Menu<String> = Menu::new(Vec::new(), options);
    let mut editor = ValueEditor {
        store: None,
        key: &label,
        validate,
        accepted: None,
    };
    menu.exec(term, &mut editor)?;
    Ok(editor.accepted)
}
