//! core-keymap: hotkey chords and the registry that maps raw key codes to actions.
//!
//! Design principles:
//! - Chords are validated when they are registered. A chord that cannot be parsed is a setup
//!   error (`ChordError`), while an unmapped key at runtime simply does not dispatch.
//! - Every raw code resolves to at most one binding. Registering a chord whose code is
//!   already bound replaces the earlier binding for that code (last writer wins) and logs the
//!   overwrite; a binding left without any code is dropped.
//! - The registry is generic over the action type so menus can bind commands, closures or
//!   plain data.

pub mod chord;

pub use chord::{Chord, ChordError};

use core_events::KeyEvent;
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Binding<A> {
    pub chord: Chord,
    pub label: String,
    pub action: A,
    codes: SmallVec<[KeyEvent; 2]>,
}

impl<A> Binding<A> {
    /// Raw codes still owned by this binding.
    pub fn codes(&self) -> &[KeyEvent] {
        &self.codes
    }

    /// `label (abbr)`, the form shown by hotkey listings and the command palette.
    pub fn display(&self) -> String {
        format!("{} ({})", self.label, self.chord.abbreviation())
    }
}

#[derive(Debug, Clone)]
pub struct HotkeyRegistry<A> {
    bindings: Vec<Binding<A>>,
    by_code: HashMap<KeyEvent, usize>,
}

impl<A> Default for HotkeyRegistry<A> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            by_code: HashMap::new(),
        }
    }
}

impl<A> HotkeyRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `chord` and bind it.
    pub fn register(
        &mut self,
        chord: &str,
        label: impl Into<String>,
        action: A,
    ) -> Result<(), ChordError> {
        let chord: Chord = chord.parse()?;
        self.register_chord(chord, label, action);
        Ok(())
    }

    pub fn register_chord(&mut self, chord: Chord, label: impl Into<String>, action: A) {
        let label = label.into();
        let codes = chord.raw_codes();
        for code in &codes {
            if let Some(prev) = self.by_code.get(code).copied() {
                let old = &mut self.bindings[prev];
                old.codes.retain(|c| c != code);
                info!(
                    target: "keymap",
                    chord = %chord,
                    previous = %old.label,
                    label = %label,
                    "hotkey_overwritten"
                );
            }
        }
        debug!(target: "keymap", chord = %chord, label = %label, "hotkey_registered");
        self.bindings.push(Binding {
            chord,
            label,
            action,
            codes,
        });
        self.reindex();
    }

    fn reindex(&mut self) {
        self.bindings.retain(|b| !b.codes.is_empty());
        self.by_code.clear();
        for (idx, b) in self.bindings.iter().enumerate() {
            for code in &b.codes {
                self.by_code.insert(*code, idx);
            }
        }
    }

    pub fn resolve(&self, raw: &KeyEvent) -> Option<&Binding<A>> {
        self.by_code.get(raw).map(|&i| &self.bindings[i])
    }

    /// Run `handler` on the action bound to `raw`. Returns true when a binding consumed it.
    pub fn dispatch(&self, raw: &KeyEvent, handler: impl FnOnce(&A)) -> bool {
        match self.resolve(raw) {
            Some(b) => {
                handler(&b.action);
                true
            }
            None => false,
        }
    }

    /// Bindings in registration order.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding<A>> {
        self.bindings.iter()
    }

    pub fn remove_where(&mut self, mut pred: impl FnMut(&Binding<A>) -> bool) {
        self.bindings.retain(|b| !pred(b));
        self.reindex();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
