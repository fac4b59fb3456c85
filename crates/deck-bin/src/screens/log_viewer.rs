//! Read-only view of the tail of the launcher's own log, newest line first.

use super::menu_options;
use crate::App;
use anyhow::Result;
use core_menu::{Menu, MenuDelegate};
use core_terminal::TerminalSession;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TAIL_LINES: usize = 2000;

/// Last `limit` lines of `path`, newest first. A missing or unreadable file is empty.
pub fn read_tail(path: &Path, limit: usize) -> Vec<String> {
    let Ok(content) = std::fs::read(path) else {
        return Vec::new();
    };
    String::from_utf8_lossy(&content)
        .lines()
        .rev()
        .filter(|l| !l.trim().is_empty())
        .take(limit)
        .map(str::to_string)
        .collect()
}

struct LogViewer {
    path: PathBuf,
}

impl MenuDelegate<String, ()> for LogViewer {
    fn on_idle(&mut self, menu: &mut Menu<String>, _term: &mut TerminalSession) -> Result<()> {
        let lines = read_tail(&self.path, TAIL_LINES);
        if lines.as_slice() != menu.items() {
            debug!(target: "menu", lines = lines.len(), "log_reloaded");
            menu.set_items(lines);
        }
        Ok(())
    }
}

pub fn show_log(app: &App, term: &mut TerminalSession) -> Result<()> {
    let path = app.log_path();
    let mut menu: Menu<String> = Menu::new(
        read_tail(&path, TAIL_LINES),
        menu_options(&app.config, "log: ").cancellable(true),
    );
    if menu.items().is_empty() {
        menu.set_message(format!("no log at {}", path.display()));
    }
    menu.exec(term, &mut LogViewer { path })?;
    Ok(())
}
