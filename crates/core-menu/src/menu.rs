use crate::{Commit, MenuDelegate, MenuError, MenuItem, MenuOptions};
use anyhow::Result;
use core_events::{InputEvent, KeyCode, KeyEvent};
use core_keymap::{ChordError, HotkeyRegistry};
use core_state::PersistentHistory;
use core_terminal::TerminalSession;
use core_text::{InputLine, match_indices};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens the command palette unless a hotkey claims the same chord.
pub const PALETTE_KEY: KeyEvent = KeyEvent::new(
    KeyCode::Char('p'),
    core_events::KeyModifiers::CTRL,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requested {
    Row(usize),
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Closed,
}

pub struct Menu<T, A = ()> {
    /// Caller order.
    items: Vec<T>,
    /// Display position to original index (history rank first).
    order: Vec<usize>,
    input: InputLine,
    /// Display positions matching the current query.
    matches: Vec<usize>,
    selected: usize,
    requested: Option<Requested>,
    message: Option<String>,
    pub(crate) preview: Vec<String>,
    hotkeys: HotkeyRegistry<A>,
    history: Option<PersistentHistory>,
    cancellable: bool,
    close_on_selection: bool,
    poll_timeout: Duration,
    last_query: Option<String>,
    last_len: usize,
    rematch: bool,
    dirty: bool,
    closed: bool,
    cancelled: bool,
    chosen: Option<usize>,
    deferred: VecDeque<InputEvent>,
    pub(crate) items_per_page: usize,
}

impl<T: MenuItem, A: Clone> Menu<T, A> {
    pub fn new(items: Vec<T>, options: MenuOptions) -> Self {
        let history = options
            .history
            .as_ref()
            .map(|h| PersistentHistory::load(&h.dir, &h.name));
        let mut menu = Self {
            items: Vec::new(),
            order: Vec::new(),
            input: InputLine::new(options.label, options.text, options.ascii_only),
            matches: Vec::new(),
            selected: 0,
            requested: None,
            message: None,
            preview: Vec::new(),
            hotkeys: HotkeyRegistry::new(),
            history,
            cancellable: options.cancellable,
            close_on_selection: options.close_on_selection,
            poll_timeout: options.poll_timeout,
            last_query: None,
            last_len: 0,
            rematch: true,
            dirty: true,
            closed: false,
            cancelled: false,
            chosen: None,
            deferred: VecDeque::new(),
            items_per_page: 1,
        };
        menu.set_items(items);
        menu
    }

    /// Replace the item list. Display order is re-derived from the history, and the next
    /// tick rematches.
    pub fn set_items(&mut self, items: Vec<T>) {
        let mut order: Vec<usize> = (0..items.len()).collect();
        if let Some(history) = &self.history {
            let store = history.store();
            order.sort_by_key(|&i| store.rank(&items[i].label()).unwrap_or(usize::MAX));
        }
        self.items = items;
        self.order = order;
        self.rematch = true;
        self.dirty = true;
    }

    /// Items in caller order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [T] {
        self.dirty = true;
        &mut self.items
    }

    pub fn item(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Original indices in display order.
    pub fn display_order(&self) -> &[usize] {
        &self.order
    }

    pub fn input(&self) -> &InputLine {
        &self.input
    }

    pub fn text(&self) -> &str {
        self.input.text()
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input.set_text(text);
        self.dirty = true;
    }

    pub fn set_prompt(&mut self, label: impl Into<String>) {
        self.input.set_label(label);
        self.dirty = true;
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.selected = 0;
        self.dirty = true;
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Transient status line drawn below the input line.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
        self.dirty = true;
    }

    pub fn clear_message(&mut self) {
        if self.message.take().is_some() {
            self.dirty = true;
        }
    }

    pub fn add_hotkey(
        &mut self,
        chord: &str,
        label: impl Into<String>,
        action: A,
    ) -> Result<(), ChordError> {
        self.hotkeys.register(chord, label, action)
    }

    pub fn hotkeys(&self) -> &HotkeyRegistry<A> {
        &self.hotkeys
    }

    pub fn hotkeys_mut(&mut self) -> &mut HotkeyRegistry<A> {
        &mut self.hotkeys
    }

    /// Row of the highlight within the match set.
    pub fn selected_row(&self) -> usize {
        self.selected
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Original index of the highlighted item.
    pub fn selected_index(&self) -> Option<usize> {
        self.matches.get(self.selected).map(|&pos| self.order[pos])
    }

    pub fn selected_item(&self) -> Option<&T> {
        self.selected_index().map(|i| &self.items[i])
    }

    /// Move the highlight to `row` on the next tick, after any rematch.
    pub fn request_selection(&mut self, row: usize) {
        self.requested = Some(Requested::Row(row));
    }

    /// Highlight the item with original index `index` on the next tick, if it matches.
    pub fn request_selection_of(&mut self, index: usize) {
        self.requested = Some(Requested::Index(index));
    }

    /// Force a rematch on the next tick.
    pub fn refresh(&mut self) {
        self.rematch = true;
        self.dirty = true;
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Close without a selection.
    pub fn close(&mut self) {
        self.closed = true;
    }

    fn close_with(&mut self, index: Option<usize>) {
        self.chosen = index;
        self.closed = true;
    }

    /// Run until the menu closes. Returns the original index of the committed item, or
    /// `None` when cancelled or closed without a selection.
    pub fn exec<D>(&mut self, term: &mut TerminalSession, delegate: &mut D) -> Result<Option<usize>>
    where
        D: MenuDelegate<T, A> + ?Sized,
    {
        self.closed = false;
        self.cancelled = false;
        self.chosen = None;
        self.dirty = true;
        debug!(target: "menu", label = self.input.label(), items = self.items.len(), "menu_open");

        while self.tick(term, delegate)? == Lifecycle::Open {}

        delegate.on_exit(self, term)?;
        if let Some(index) = self.chosen {
            self.record_history(index);
        }
        debug!(target: "menu", label = self.input.label(), chosen = ?self.chosen, "menu_closed");
        Ok(self.chosen)
    }

    /// One pass of the event loop.
    pub fn tick<D>(&mut self, term: &mut TerminalSession, delegate: &mut D) -> Result<Lifecycle>
    where
        D: MenuDelegate<T, A> + ?Sized,
    {
        self.update_matches();
        self.apply_requested_selection();
        if self.dirty {
            self.preview = delegate.preview_lines(self);
            self.draw(term)?;
        }

        let event = match self.deferred.pop_front() {
            Some(ev) => Some(ev),
            None => term.surface().poll_input(self.poll_timeout)?,
        };
        match event {
            Some(ev) => self.handle_event(term, delegate, ev)?,
            None => delegate.on_idle(self, term)?,
        }

        Ok(if self.closed {
            Lifecycle::Closed
        } else {
            Lifecycle::Open
        })
    }

    /// Drain pending input without blocking while long idle work runs. Navigation and plain
    /// text editing apply immediately; every other event is queued for the next tick.
    ///
    /// Returns true when any key arrived, applied or queued. Applied keys never reach the
    /// delegate's `on_key`, so callers tracking key activity use this instead.
    pub fn pump(&mut self, term: &mut TerminalSession) -> Result<bool> {
        let mut typed = false;
        while let Some(ev) = term.surface().poll_input(Duration::ZERO)? {
            typed |= matches!(ev, InputEvent::Key(_));
            match ev {
                InputEvent::Resize(..) => self.dirty = true,
                InputEvent::Key(key)
                    if self.hotkeys.resolve(&key).is_none()
                        && (self.navigate(&key) || self.input.apply_key(&key)) =>
                {
                    self.dirty = true;
                }
                other => self.deferred.push_back(other),
            }
        }
        self.update_matches();
        self.apply_requested_selection();
        if self.dirty {
            self.draw(term)?;
        }
        Ok(typed)
    }

    fn update_matches(&mut self) {
        let query_changed = self.last_query.as_deref() != Some(self.input.text());
        if !(self.rematch || query_changed || self.last_len != self.items.len()) {
            return;
        }
        let items = &self.items;
        self.matches = match_indices(
            self.order.iter().map(|&i| items[i].label()),
            self.input.text(),
        );
        self.last_query = Some(self.input.text().to_string());
        self.last_len = self.items.len();
        self.rematch = false;
        self.selected = 0;
        self.dirty = true;
    }

    fn apply_requested_selection(&mut self) {
        let row = match self.requested.take() {
            None => return,
            Some(Requested::Row(row)) => row,
            Some(Requested::Index(index)) => {
                let Some(row) = self.matches.iter().position(|&pos| self.order[pos] == index)
                else {
                    return;
                };
                row
            }
        };
        self.selected = self.clamp_row(row);
        self.dirty = true;
    }

    fn clamp_row(&self, row: usize) -> usize {
        row.min(self.matches.len().saturating_sub(1))
    }

    /// Up/Down/PageUp/PageDown. Returns false for any other key.
    fn navigate(&mut self, key: &KeyEvent) -> bool {
        if !key.mods.is_empty() {
            return false;
        }
        let page = self.items_per_page.max(1);
        self.selected = match key.code.without_keypad() {
            KeyCode::Up => self.selected.saturating_sub(1),
            KeyCode::Down => self.clamp_row(self.selected + 1),
            KeyCode::PageUp => self.selected.saturating_sub(page),
            KeyCode::PageDown => self.clamp_row(self.selected + page),
            _ => return false,
        };
        true
    }

    fn handle_event<D>(
        &mut self,
        term: &mut TerminalSession,
        delegate: &mut D,
        event: InputEvent,
    ) -> Result<()>
    where
        D: MenuDelegate<T, A> + ?Sized,
    {
        match event {
            InputEvent::Resize(cols, rows) => {
                debug!(target: "menu", cols, rows, "resize");
                self.dirty = true;
            }
            InputEvent::Paste(text) => {
                debug!(target: "menu", len = text.len(), "paste");
                self.input.insert_str(&text);
                self.dirty = true;
            }
            InputEvent::Key(key) => self.handle_key(term, delegate, key)?,
        }
        Ok(())
    }

    fn handle_key<D>(
        &mut self,
        term: &mut TerminalSession,
        delegate: &mut D,
        key: KeyEvent,
    ) -> Result<()>
    where
        D: MenuDelegate<T, A> + ?Sized,
    {
        if delegate.on_key(self, term, &key)? {
            self.dirty = true;
            return Ok(());
        }
        if key == KeyEvent::plain(KeyCode::Tab) {
            if let Some(label) = self.selected_item().map(|item| item.label().into_owned()) {
                self.input.set_text(label);
            }
            self.dirty = true;
            return Ok(());
        }
        if key.is_ctrl_char('c') {
            info!(target: "menu", label = self.input.label(), "interrupted");
            return Err(MenuError::Interrupted.into());
        }
        if let Some(action) = self.hotkeys.resolve(&key).map(|b| b.action.clone()) {
            delegate.on_hotkey(self, term, &action)?;
            self.dirty = true;
            return Ok(());
        }
        if key == PALETTE_KEY {
            return self.open_palette(term, delegate);
        }
        if self.navigate(&key) {
            self.dirty = true;
            return Ok(());
        }
        match (key.mods.is_empty(), key.code) {
            (true, KeyCode::Enter) => self.commit(term, delegate)?,
            (true, KeyCode::Esc) => {
                if self.cancellable {
                    self.cancelled = true;
                    self.close_with(None);
                } else {
                    self.input.clear();
                }
                self.dirty = true;
            }
            _ => {
                if self.input.apply_key(&key) {
                    self.dirty = true;
                }
            }
        }
        Ok(())
    }

    fn commit<D>(&mut self, term: &mut TerminalSession, delegate: &mut D) -> Result<()>
    where
        D: MenuDelegate<T, A> + ?Sized,
    {
        self.dirty = true;
        let Some(index) = self.selected_index() else {
            return Ok(());
        };
        if self.items[index].has_action() {
            let item = &self.items[index];
            term.released(|| item.run_action())??;
            if self.close_on_selection {
                self.close_with(Some(index));
            }
            return Ok(());
        }
        match delegate.on_commit(self, term, index)? {
            Commit::Close => self.close_with(Some(index)),
            Commit::KeepOpen => {}
        }
        Ok(())
    }

    /// Nested menu listing every hotkey; the picked one runs and the palette closes.
    fn open_palette<D>(&mut self, term: &mut TerminalSession, delegate: &mut D) -> Result<()>
    where
        D: MenuDelegate<T, A> + ?Sized,
    {
        self.dirty = true;
        let entries: Vec<(String, A)> = self
            .hotkeys
            .bindings()
            .map(|b| (b.display(), b.action.clone()))
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        let labels = entries.iter().map(|(label, _)| label.clone()).collect();
        let mut palette: Menu<String> = Menu::new(
            labels,
            MenuOptions::new(": command palette")
                .ascii_only(self.input.ascii_only())
                .poll_timeout(self.poll_timeout),
        );
        if let Some(picked) = palette.exec(term, &mut ())? {
            debug!(target: "menu", command = %entries[picked].0, "palette_command");
            delegate.on_hotkey(self, term, &entries[picked].1)?;
        }
        Ok(())
    }

    fn record_history(&mut self, index: usize) {
        let Some(history) = &mut self.history else {
            return;
        };
        let label = self.items[index].label();
        if let Err(e) = history.commit(&label) {
            warn!(target: "state.persist", path = %history.path().display(), error = %e, "history_save_failed");
        }
    }

    pub(crate) fn match_rows(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.matches
            .iter()
            .map(|&pos| (pos, &self.items[self.order[pos]]))
    }

    pub(crate) fn finish_draw(&mut self) {
        self.dirty = false;
    }
}
