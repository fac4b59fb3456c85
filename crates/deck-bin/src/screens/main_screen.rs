//! The launcher screen: every script in the catalog, most recently used first.

use super::{config_editor, log_viewer, menu_options, value_editor, variables};
use crate::App;
use crate::exec::{ExecRequest, Launch};
use anyhow::Result;
use chrono::Local;
use core_events::{KeyCode, KeyEvent, KeyModifiers};
use core_ipc::RunStatus;
use core_menu::{Commit, Menu, MenuDelegate, MenuItem};
use core_registry::ScriptDescriptor;
use core_registry::files::free_sibling_path;
use core_terminal::TerminalSession;
use std::borrow::Cow;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Environment variable carrying the highlighted script into hotkey-bound scripts.
pub const SELECTED_SCRIPT_ENV: &str = "SCRIPT";

#[derive(Debug, Clone)]
pub struct ScriptItem(pub Arc<ScriptDescriptor>);

impl MenuItem for ScriptItem {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.0.display_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainAction {
    Refresh,
    EditConfig,
    EditSource,
    ShowLog,
    ListHotkeys,
    NewScript,
    DuplicateScript,
    RenameScript,
    RunBound(PathBuf),
}

/// File operations behind `ctrl+n`, `ctrl+d` and `shift+n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CatalogEdit {
    New,
    Duplicate,
    Rename,
}

impl CatalogEdit {
    fn prompt(self) -> &'static str {
        match self {
            CatalogEdit::New => "new script: ",
            CatalogEdit::Duplicate => "duplicate as: ",
            CatalogEdit::Rename => "rename to: ",
        }
    }
}

type MainMenu = Menu<ScriptItem, MainAction>;

fn builtin_hotkeys() -> [(&'static str, &'static str, MainAction); 8] {
    [
        ("ctrl+r", "reload scripts", MainAction::Refresh),
        ("shift+m", "edit script config", MainAction::EditConfig),
        ("ctrl+n", "new script", MainAction::NewScript),
        ("ctrl+d", "duplicate script", MainAction::DuplicateScript),
        ("shift+n", "rename script", MainAction::RenameScript),
        ("ctrl+e", "edit script source", MainAction::EditSource),
        ("ctrl+l", "show log", MainAction::ShowLog),
        ("?", "list hotkeys", MainAction::ListHotkeys),
    ]
}

fn items(app: &App) -> Vec<ScriptItem> {
    app.registry.all().iter().cloned().map(ScriptItem).collect()
}

fn selected_path(menu: &MainMenu) -> Option<PathBuf> {
    menu.selected_item().map(|item| item.0.path.clone())
}

/// Built-in hotkeys first, then each script's own chord. A script chord that does not parse
/// is skipped with a warning; a broken built-in is a bug and fails.
fn install_hotkeys(app: &App, menu: &mut MainMenu) -> Result<()> {
    menu.hotkeys_mut().remove_where(|_| true);
    for (chord, label, action) in builtin_hotkeys() {
        menu.add_hotkey(chord, label, action)?;
    }
    for (chord, path) in app.registry.hotkeys() {
        let label = app
            .registry
            .get(path)
            .map(|d| d.display_name.clone())
            .unwrap_or_default();
        if let Err(e) = menu.add_hotkey(chord, label, MainAction::RunBound(path.to_path_buf())) {
            warn!(target: "keymap", chord, path = %path.display(), error = %e, "script_hotkey_invalid");
        }
    }
    Ok(())
}

/// Rebuild items and hotkeys from the registry, keeping the highlight on `keep`.
fn reload(app: &App, menu: &mut MainMenu, keep: Option<&Path>) -> Result<()> {
    let items = items(app);
    let index = keep.and_then(|p| items.iter().position(|item| item.0.path == p));
    menu.set_items(items);
    if let Some(index) = index {
        menu.request_selection_of(index);
    }
    install_hotkeys(app, menu)
}

pub struct MainScreen<'a> {
    app: &'a mut App,
}

impl<'a> MainScreen<'a> {
    pub fn new(app: &'a mut App) -> Self {
        Self { app }
    }

    /// Interruptible full rescan. Input stays live through the menu's pump while the walk runs.
    fn refresh(&mut self, menu: &mut MainMenu, term: &mut TerminalSession) -> Result<()> {
        if !self.app.scheduler.begin_refresh() {
            return Ok(());
        }
        let roots = self.app.config.file.scripts.roots.clone();
        let mut pump_failed = None;
        let mut last_key = None;
        let delta = self.app.registry.scan(&roots, |seen| {
            menu.set_message(format!("refreshing... {seen} files"));
            match menu.pump(term) {
                Ok(typed) => {
                    if typed {
                        last_key = Some(Instant::now());
                    }
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    pump_failed = Some(e);
                    ControlFlow::Break(())
                }
            }
        });
        if let Some(at) = last_key {
            self.app.scheduler.note_key_press(at);
        }
        self.app.scheduler.finish_refresh(Instant::now());
        if let Some(e) = pump_failed {
            return Err(e);
        }
        self.app.registry.sort_by_access_time();
        menu.clear_message();
        let keep = selected_path(menu);
        reload(self.app, menu, keep.as_deref())?;
        info!(
            target: "registry.scan",
            added = delta.added.len(),
            removed = delta.removed.len(),
            changed = delta.changed.len(),
            "refresh_applied"
        );
        Ok(())
    }

    fn touch_and_sort(&mut self, menu: &mut MainMenu, path: &Path) -> Result<()> {
        if let Err(e) = self.app.registry.touch(path) {
            warn!(target: "state.persist", path = %path.display(), error = %e, "access_time_save_failed");
        }
        self.app.registry.sort_by_access_time();
        reload(self.app, menu, Some(path))
    }

    /// Enter, Alt+Enter and a confirmed variable window all end up here.
    fn run_selected(
        &mut self,
        menu: &mut MainMenu,
        term: &mut TerminalSession,
        path: &Path,
        launch: &Launch,
    ) -> Result<()> {
        self.touch_and_sort(menu, path)?;
        self.app.launch(term, path, launch)?;
        self.after_run(menu, term, path)
    }

    fn after_run(&mut self, menu: &mut MainMenu, term: &mut TerminalSession, path: &Path) -> Result<()> {
        let reload_after = self
            .app
            .descriptor(path)
            .is_some_and(|d| d.config.reload_scripts_after_run());
        if reload_after {
            self.refresh(menu, term)?;
        }
        if self.app.options().quit_after_run {
            menu.close();
        }
        Ok(())
    }

    /// A script hotkey: the highlighted script rides along in `SCRIPT`.
    fn run_bound(&mut self, menu: &mut MainMenu, term: &mut TerminalSession, bound: &Path) -> Result<()> {
        let selected = selected_path(menu);
        let mut launch = Launch::default();
        if let Some(sel) = &selected {
            launch
                .env
                .push((SELECTED_SCRIPT_ENV.to_string(), sel.to_string_lossy().into_owned()));
        }
        self.app.launch(term, bound, &launch)?;

        let Some(desc) = self.app.descriptor(bound) else {
            return Ok(());
        };
        if desc.config.reload_scripts_after_run() {
            self.refresh(menu, term)?;
        } else if desc.config.update_selected_script_access_time()
            && let Some(sel) = &selected
        {
            self.touch_and_sort(menu, sel)?;
        }
        if self.app.options().quit_after_run {
            menu.close();
        }
        Ok(())
    }

    fn edit_source(&mut self, term: &mut TerminalSession, path: &Path) -> Result<()> {
        let editor = ["VISUAL", "EDITOR"]
            .iter()
            .find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| "vi".to_string());
        let request = ExecRequest {
            script_path: path.to_path_buf(),
            interpreter: shell_words::split(&editor)?,
            args: Vec::new(),
            env: Vec::new(),
            close_on_exit: true,
        };
        debug!(target: "runtime.exec", path = %path.display(), "edit_source");
        self.app.execute(term, &request)?;
        Ok(())
    }

    /// Ask for a name next to the selected script, then create, copy or rename the file.
    /// Name problems are shown in the prompt; a failed file operation ends up in the main
    /// screen's status line.
    fn edit_catalog(
        &mut self,
        menu: &mut MainMenu,
        term: &mut TerminalSession,
        edit: CatalogEdit,
    ) -> Result<()> {
        let Some(selected) = selected_path(menu) else {
            return Ok(());
        };
        let current = selected
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut options = menu_options(&self.app.config, edit.prompt());
        if edit != CatalogEdit::New {
            options = options.text(current);
        }
        let validate = |name: &str| {
            free_sibling_path(&selected, name)
                .map(|_| ())
                .map_err(|e| e.to_string())
        };
        let Some(name) = value_editor::prompt_text(term, options, &validate)? else {
            return Ok(());
        };

        let registry = &mut self.app.registry;
        let outcome = match edit {
            CatalogEdit::New => registry.create_script(&selected, &name),
            CatalogEdit::Duplicate => registry.duplicate_script(&selected, &name),
            CatalogEdit::Rename => registry.rename_script(&selected, &name),
        };
        menu.clear_input();
        let path = match outcome {
            Ok(path) => path,
            Err(e) => {
                warn!(target: "registry.files", ?edit, error = %e, "catalog_edit_failed");
                menu.set_message(format!("{e:#}"));
                return Ok(());
            }
        };
        reload(self.app, menu, Some(&path))?;
        if edit == CatalogEdit::New {
            self.edit_source(term, &path)?;
            self.refresh(menu, term)?;
        }
        Ok(())
    }

    fn list_hotkeys(&mut self, menu: &MainMenu, term: &mut TerminalSession) -> Result<()> {
        let lines: Vec<String> = menu.hotkeys().bindings().map(|b| b.display()).collect();
        let mut list: Menu<String> = Menu::new(lines, menu_options(&self.app.config, "hotkeys: "));
        list.exec(term, &mut ())?;
        Ok(())
    }

    fn serve_triggers(&mut self, menu: &mut MainMenu, term: &mut TerminalSession) -> Result<()> {
        let pending = match self.app.triggers() {
            Some(queue) => queue.drain(),
            None => return Ok(()),
        };
        for pending in pending {
            let request = pending.request.clone();
            let Some(path) = self.app.registry.find(&request.script_ref).map(|d| d.path.clone())
            else {
                info!(target: "ipc.server", script = %request.script_ref, "trigger_not_found");
                pending.respond(RunStatus::NotFound);
                continue;
            };
            if !pending.respond(RunStatus::Ok) {
                warn!(target: "ipc.server", script = %request.script_ref, "trigger_expired");
                continue;
            }
            let mut launch = Launch {
                extra_args: request.args,
                ..Launch::default()
            };
            if let Some(source) = request.source {
                launch.env.push((
                    SELECTED_SCRIPT_ENV.to_string(),
                    source.selected_script_path.to_string_lossy().into_owned(),
                ));
            }
            self.app.launch(term, &path, &launch)?;
            self.after_run(menu, term, &path)?;
        }
        Ok(())
    }
}

impl MenuDelegate<ScriptItem, MainAction> for MainScreen<'_> {
    fn on_key(
        &mut self,
        menu: &mut MainMenu,
        term: &mut TerminalSession,
        key: &KeyEvent,
    ) -> Result<bool> {
        self.app.scheduler.note_key_press(Instant::now());
        let Some(desc) = menu.selected_item().map(|item| item.0.clone()) else {
            return Ok(false);
        };
        if *key == KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT) {
            let launch = Launch {
                close_on_exit: Some(false),
                ..Launch::default()
            };
            self.run_selected(menu, term, &desc.path, &launch)?;
            menu.clear_input();
            return Ok(true);
        }
        if *key == KeyEvent::plain(KeyCode::Tab) && !desc.variables.is_empty() {
            if variables::edit_variables(self.app, term, &desc)? {
                self.run_selected(menu, term, &desc.path, &Launch::default())?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn on_hotkey(
        &mut self,
        menu: &mut MainMenu,
        term: &mut TerminalSession,
        action: &MainAction,
    ) -> Result<()> {
        debug!(target: "menu", ?action, "main_hotkey");
        let selected = selected_path(menu);
        match action {
            MainAction::Refresh => self.refresh(menu, term)?,
            MainAction::EditConfig => {
                if let Some(path) = selected
                    && config_editor::edit_config(self.app, term, &path)?
                {
                    reload(self.app, menu, Some(&path))?;
                }
            }
            MainAction::EditSource => {
                if let Some(path) = selected {
                    self.edit_source(term, &path)?;
                    self.refresh(menu, term)?;
                }
            }
            MainAction::ShowLog => log_viewer::show_log(self.app, term)?,
            MainAction::ListHotkeys => self.list_hotkeys(menu, term)?,
            MainAction::NewScript => self.edit_catalog(menu, term, CatalogEdit::New)?,
            MainAction::DuplicateScript => {
                self.edit_catalog(menu, term, CatalogEdit::Duplicate)?
            }
            MainAction::RenameScript => self.edit_catalog(menu, term, CatalogEdit::Rename)?,
            MainAction::RunBound(path) => self.run_bound(menu, term, path)?,
        }
        Ok(())
    }

    fn on_commit(
        &mut self,
        menu: &mut MainMenu,
        term: &mut TerminalSession,
        index: usize,
    ) -> Result<Commit> {
        let Some(path) = menu.item(index).map(|item| item.0.path.clone()) else {
            return Ok(Commit::KeepOpen);
        };
        self.run_selected(menu, term, &path, &Launch::default())?;
        menu.clear_input();
        Ok(if self.app.options().quit_after_run {
            Commit::Close
        } else {
            Commit::KeepOpen
        })
    }

    fn on_idle(&mut self, menu: &mut MainMenu, term: &mut TerminalSession) -> Result<()> {
        if self.app.scheduler.refresh_due(Instant::now()) {
            self.refresh(menu, term)?;
        }
        let due = self.app.scheduler.due_scripts(&self.app.registry, Local::now());
        for path in due {
            self.app.launch(term, &path, &Launch::default())?;
            self.after_run(menu, term, &path)?;
        }
        self.serve_triggers(menu, term)
    }

    fn preview_lines(&mut self, menu: &MainMenu) -> Vec<String> {
        let Some(desc) = menu.selected_item().map(|item| item.0.clone()) else {
            return Vec::new();
        };
        let names = match desc.read_variables() {
            Ok(names) => names,
            Err(e) => {
                warn!(target: "registry.scan", script = %desc.display_name, error = %e, "preview_skipped");
                return Vec::new();
            }
        };
        let mut lines: Vec<String> = desc
            .config
            .non_defaults()
            .map(|(key, value)| format!("[Cfg] {key} : {value}"))
            .collect();
        lines.extend(names.iter().map(|name| {
            format!(
                "{} : {}",
                desc.short_variable_name(name),
                self.app.variables.latest(name).unwrap_or("")
            )
        }));
        lines
    }
}

/// One main screen session. Returns when the menu closes (only with `--quit`).
pub fn run(app: &mut App, term: &mut TerminalSession) -> Result<()> {
    let options = menu_options(&app.config, app.config.prompt()).cancellable(false);
    let mut menu: MainMenu = Menu::new(items(app), options);
    install_hotkeys(app, &mut menu)?;
    info!(target: "menu", scripts = menu.items().len(), "main_screen_open");
    menu.exec(term, &mut MainScreen::new(app))?;
    Ok(())
}
