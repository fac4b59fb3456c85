//! Variable window: review and edit the values a script will receive before running it.

use super::{menu_options, value_editor};
use crate::App;
use anyhow::Result;
use core_events::{KeyCode, KeyEvent};
use core_menu::{Menu, MenuDelegate, MenuItem};
use core_registry::ScriptDescriptor;
use core_terminal::TerminalSession;
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRow {
    pub name: String,
    label: String,
}

impl VariableRow {
    fn new(desc: &ScriptDescriptor, name: &str, latest: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            label: format!("{} : {}", desc.short_variable_name(name), latest.unwrap_or("")),
        }
    }
}

impl MenuItem for VariableRow {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.label)
    }
}

pub(crate) fn rows(app: &App, desc: &ScriptDescriptor) -> Vec<VariableRow> {
    desc.variables
        .iter()
        .map(|name| VariableRow::new(desc, name, app.variables.latest(name)))
        .collect()
}

struct VariableWindow<'a> {
    app: &'a mut App,
    desc: &'a ScriptDescriptor,
}

impl MenuDelegate<VariableRow, ()> for VariableWindow<'_> {
    fn on_key(
        &mut self,
        menu: &mut Menu<VariableRow>,
        term: &mut TerminalSession,
        key: &KeyEvent,
    ) -> Result<bool> {
        if *key != KeyEvent::plain(KeyCode::Tab) {
            return Ok(false);
        }
        let Some(name) = menu.selected_item().map(|row| row.name.clone()) else {
            return Ok(true);
        };
        let short = self.desc.short_variable_name(&name).to_string();
        let options = menu_options(&self.app.config, format!("{short}: "));
        let accept_any = |_: &str| -> Result<(), String> { Ok(()) };
        value_editor::edit_value(term, &mut self.app.variables, &name, options, &accept_any)?;
        let index = menu.selected_index();
        menu.set_items(rows(self.app, self.desc));
        if let Some(index) = index {
            menu.request_selection_of(index);
        }
        Ok(true)
    }
}

/// Show the variables of `desc`. Returns true when the window was confirmed with Enter.
pub fn edit_variables(
    app: &mut App,
    term: &mut TerminalSession,
    desc: &ScriptDescriptor,
) -> Result<bool> {
    let items = rows(app, desc);
    let options = menu_options(&app.config, format!("{} variables: ", desc.display_name));
    let mut menu: Menu<VariableRow> = Menu::new(items, options);
    let mut window = VariableWindow { app, desc };
    let confirmed = menu.exec(term, &mut window)?.is_some();
    Ok(confirmed)
}
