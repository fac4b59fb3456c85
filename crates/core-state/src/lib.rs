//! Persistent user state: MRU histories and the shared variable store.
//!
//! Everything here is plain data plus JSON persistence. Loading never fails: a missing or
//! malformed file yields an empty value and a warning. Saving is atomic (temp file in the
//! destination directory, then rename).

pub mod history;
pub mod persist;

pub use history::{HISTORY_MAX, HistoryStore, KeyedHistory};

use anyhow::Result;
use std::path::{Path, PathBuf};

pub const VARIABLES_FILE: &str = "variables.json";
pub const CONFIG_HISTORY_FILE: &str = "config_history.json";

/// File holding the history called `name` inside `dir`.
pub fn history_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}_history.json", slug::slugify(name)))
}

/// A history list bound to its file.
#[derive(Debug, Clone)]
pub struct PersistentHistory {
    path: PathBuf,
    store: HistoryStore,
}

impl PersistentHistory {
    pub fn load(dir: &Path, name: &str) -> Self {
        let path = history_path(dir, name);
        let store = persist::load_json_or_default(&path);
        Self { path, store }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move `value` to the front and write the file.
    pub fn commit(&mut self, value: &str) -> Result<()> {
        self.store.push(value);
        persist::save_json_atomic(&self.path, &self.store)
    }
}

/// A keyed history map bound to its file (variables, config value suggestions).
#[derive(Debug, Clone)]
pub struct KeyedHistoryFile {
    path: PathBuf,
    map: KeyedHistory,
}

impl KeyedHistoryFile {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = persist::load_json_or_default(&path);
        Self { path, map }
    }

    pub fn variables(dir: &Path) -> Self {
        Self::load(dir.join(VARIABLES_FILE))
    }

    pub fn config_history(dir: &Path) -> Self {
        Self::load(dir.join(CONFIG_HISTORY_FILE))
    }

    pub fn map(&self) -> &KeyedHistory {
        &self.map
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.map.values(key)
    }

    pub fn latest(&self, key: &str) -> Option<&str> {
        self.map.latest(key)
    }

    pub fn push(&mut self, key: &str, value: &str) -> Result<()> {
        self.map.push(key, value);
        self.save()
    }

    pub fn remove(&mut self, key: &str, value: &str) -> Result<bool> {
        let removed = self.map.remove(key, value);
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Re-read the file, picking up writes made by other screens.
    pub fn reload(&mut self) {
        self.map = persist::load_json_or_default(&self.path);
    }

    fn save(&self) -> Result<()> {
        persist::save_json_atomic(&self.path, &self.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn history_file_name_is_slugged() {
        let p = history_path(Path::new("/data"), "Main Menu");
        assert_eq!(p, PathBuf::from("/data/main-menu_history.json"));
    }

    #[test]
    fn commit_persists_mru_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = PersistentHistory::load(dir.path(), "main");
        for v in ["c", "a", "b"] {
            h.commit(v).unwrap();
        }
        h.commit("a").unwrap();
        let reloaded = PersistentHistory::load(dir.path(), "main");
        assert_eq!(reloaded.store().entries(), ["a", "b", "c"]);
    }

    #[test]
    fn variables_shared_and_deletable() {
        let dir = tempfile::tempdir().unwrap();
        let mut vars = KeyedHistoryFile::variables(dir.path());
        vars.push("HOST", "alpha").unwrap();
        vars.push("HOST", "beta").unwrap();
        assert_eq!(vars.latest("HOST"), Some("beta"));
        assert!(vars.remove("HOST", "beta").unwrap());
        assert!(!vars.remove("HOST", "zzz").unwrap());

        let other = KeyedHistoryFile::variables(dir.path());
        assert_eq!(other.values("HOST"), ["alpha"]);
        assert!(other.values("MISSING").is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(VARIABLES_FILE), "{not json").unwrap();
        let vars = KeyedHistoryFile::variables(dir.path());
        assert!(vars.map().is_empty());
    }
}
