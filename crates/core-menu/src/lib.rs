//! core-menu: the filterable list controller every screen is built from.
//!
//! A [`Menu`] owns the item list, the query [`InputLine`](core_text::InputLine), the match set
//! and the selection. Screens customize it through a [`MenuDelegate`] instead of wrapping the
//! controller: key handling, hotkey actions, commit handling, idle work, a preview area and an
//! exit hook.
//!
//! Loop per tick:
//! 1. rematch when the query or the item count changed (selection resets to the first row),
//! 2. apply a pending programmatic selection,
//! 3. redraw when dirty (input line last so the cursor lands on it),
//! 4. poll one input event (bounded by the poll timeout),
//! 5. handle the event, or run the idle hook when the poll timed out.
//!
//! Returned indices always refer to the caller's original item order, even when a history
//! name re-sorted the items by recent use.

mod menu;
mod render;

pub use menu::{Lifecycle, Menu, PALETTE_KEY};

use anyhow::Result;
use core_events::KeyEvent;
use core_terminal::TerminalSession;
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MenuError {
    /// Ctrl+C was pressed inside a menu.
    #[error("interrupted by user")]
    Interrupted,
}

/// True when `err` carries [`MenuError::Interrupted`].
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<MenuError>(), Some(MenuError::Interrupted))
}

/// Something a menu can list.
pub trait MenuItem {
    /// Text matched against the query and drawn in the list.
    fn label(&self) -> Cow<'_, str>;

    /// Items with a bound action run it on Enter (terminal released) instead of closing the
    /// menu.
    fn has_action(&self) -> bool {
        false
    }

    fn run_action(&self) -> Result<()> {
        Ok(())
    }
}

impl MenuItem for String {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl MenuItem for &str {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

/// A named callback, listed like any other item.
pub struct ActionItem {
    name: String,
    callback: Box<dyn Fn() -> Result<()>>,
}

impl ActionItem {
    pub fn new(name: impl Into<String>, callback: impl Fn() -> Result<()> + 'static) -> Self {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for ActionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionItem").field("name", &self.name).finish()
    }
}

impl MenuItem for ActionItem {
    fn label(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn has_action(&self) -> bool {
        true
    }

    fn run_action(&self) -> Result<()> {
        (self.callback)()
    }
}

/// What happens after the delegate handled a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// Close and return the selected index.
    Close,
    KeepOpen,
}

/// Where a menu keeps its selection history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySpec {
    pub dir: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct MenuOptions {
    pub label: String,
    pub text: String,
    pub ascii_only: bool,
    pub cancellable: bool,
    /// Close after running an item's bound action.
    pub close_on_selection: bool,
    pub history: Option<HistorySpec>,
    pub poll_timeout: Duration,
}

impl Default for MenuOptions {
    fn default() -> Self {
        Self {
            label: String::new(),
            text: String::new(),
            ascii_only: false,
            cancellable: true,
            close_on_selection: false,
            history: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl MenuOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn ascii_only(mut self, yes: bool) -> Self {
        self.ascii_only = yes;
        self
    }

    pub fn cancellable(mut self, yes: bool) -> Self {
        self.cancellable = yes;
        self
    }

    pub fn close_on_selection(mut self, yes: bool) -> Self {
        self.close_on_selection = yes;
        self
    }

    pub fn history(mut self, dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        self.history = Some(HistorySpec {
            dir: dir.into(),
            name: name.into(),
        });
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

/// Screen-specific behaviour plugged into a [`Menu`]. Every hook has a no-op default.
///
/// Hooks receive the menu and the terminal session, so they can open nested menus or run
/// work with the terminal released.
pub trait MenuDelegate<T: MenuItem, A> {
    /// First look at every key. Return true to consume it.
    fn on_key(
        &mut self,
        _menu: &mut Menu<T, A>,
        _term: &mut TerminalSession,
        _key: &KeyEvent,
    ) -> Result<bool> {
        Ok(false)
    }

    fn on_hotkey(
        &mut self,
        _menu: &mut Menu<T, A>,
        _term: &mut TerminalSession,
        _action: &A,
    ) -> Result<()> {
        Ok(())
    }

    /// Enter on an item without a bound action. `index` is the original item index.
    fn on_commit(
        &mut self,
        _menu: &mut Menu<T, A>,
        _term: &mut TerminalSession,
        _index: usize,
    ) -> Result<Commit> {
        Ok(Commit::Close)
    }

    /// Called when a poll times out with no input.
    fn on_idle(&mut self, _menu: &mut Menu<T, A>, _term: &mut TerminalSession) -> Result<()> {
        Ok(())
    }

    /// Lines drawn below the list.
    fn preview_lines(&mut self, _menu: &Menu<T, A>) -> Vec<String> {
        Vec::new()
    }

    fn on_exit(&mut self, _menu: &mut Menu<T, A>, _term: &mut TerminalSession) -> Result<()> {
        Ok(())
    }
}

impl<T: MenuItem, A> MenuDelegate<T, A> for () {}
