//! Per-script config editor. Values are typed by the schema; accepted edits are saved to the
//! script's override file right away.

use super::{menu_options, value_editor};
use crate::App;
use anyhow::{Context, Result};
use core_config::ScriptConfig;
use core_events::{KeyCode, KeyEvent};
use core_menu::{Menu, MenuDelegate, MenuItem};
use core_terminal::TerminalSession;
use std::borrow::Cow;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRow {
    pub key: &'static str,
    label: String,
}

impl MenuItem for ConfigRow {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.label)
    }
}

pub(crate) fn rows(config: &ScriptConfig) -> Vec<ConfigRow> {
    config
        .iter()
        .map(|(key, value, is_default)| ConfigRow {
            key,
            label: format!("{key} : {value}{}", if is_default { "" } else { " (*)" }),
        })
        .collect()
}

struct ConfigEditor<'a> {
    app: &'a mut App,
    path: &'a Path,
    changed: bool,
}

impl ConfigEditor<'_> {
    fn current(&self) -> Result<ScriptConfig> {
        self.app
            .descriptor(self.path)
            .map(|d| d.config.clone())
            .with_context(|| format!("script {} vanished", self.path.display()))
    }

    fn edit(&mut self, menu: &mut Menu<ConfigRow>, term: &mut TerminalSession, key: &str) -> Result<()> {
        let config = self.current()?;
        let options = menu_options(&self.app.config, format!("{key}: "));
        let validate = |text: &str| {
            let mut trial = config.clone();
            trial.set_from_text(key, text).map_err(|e| e.to_string())
        };
        let Some(value) =
            value_editor::edit_value(term, &mut self.app.config_history, key, options, &validate)?
        else {
            return Ok(());
        };
        let mut updated = config.clone();
        updated.set_from_text(key, &value)?;
        self.app.registry.update_config(self.path, updated.clone())?;
        info!(target: "config", key, path = %self.path.display(), "script_config_edited");
        self.changed = true;

        let index = menu.selected_index();
        menu.set_items(rows(&updated));
        if let Some(index) = index {
            menu.request_selection_of(index);
        }
        Ok(())
    }
}

impl MenuDelegate<ConfigRow, ()> for ConfigEditor<'_> {
    fn on_key(
        &mut self,
        menu: &mut Menu<ConfigRow>,
        term: &mut TerminalSession,
        key: &KeyEvent,
    ) -> Result<bool> {
        if *key != KeyEvent::plain(KeyCode::Tab) {
            return Ok(false);
        }
        if let Some(field) = menu.selected_item().map(|row| row.key) {
            self.edit(menu, term, field)?;
        }
        Ok(true)
    }
}

/// Edit the config of the script at `path`. Returns true when anything was saved.
pub fn edit_config(app: &mut App, term: &mut TerminalSession, path: &Path) -> Result<bool> {
    let Some(desc) = app.descriptor(path) else {
        return Ok(false);
    };
    let options = menu_options(&app.config, format!("{} config: ", desc.display_name));
    let mut menu: Menu<ConfigRow> = Menu::new(rows(&desc.config), options);
    let mut editor = ConfigEditor {
        app,
        path,
        changed: false,
    };
    menu.exec(term, &mut editor)?;
    Ok(editor.changed)
}
