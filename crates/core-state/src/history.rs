use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Maximum number of entries retained per history list.
pub const HISTORY_MAX: usize = 1000;

/// Most-recently-used list of strings. Index 0 is the most recent entry; entries are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HistoryStore {
    entries: Vec<String>,
}

impl<'de> Deserialize<'de> for HistoryStore {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = Vec::<String>::deserialize(d)?;
        Ok(Self::from_entries(raw))
    }
}

impl HistoryStore {
    /// Build from a list in MRU order, dropping later duplicates.
    pub fn from_entries(raw: impl IntoIterator<Item = String>) -> Self {
        let mut entries: Vec<String> = Vec::new();
        for e in raw {
            if !entries.contains(&e) {
                entries.push(e);
            }
        }
        entries.truncate(HISTORY_MAX);
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.first().map(String::as_str)
    }

    /// Position of `value`, 0 being the most recent.
    pub fn rank(&self, value: &str) -> Option<usize> {
        self.entries.iter().position(|e| e == value)
    }

    /// Put `value` at the front, removing an earlier occurrence.
    pub fn push(&mut self, value: &str) {
        if let Some(i) = self.rank(value) {
            let v = self.entries.remove(i);
            self.entries.insert(0, v);
            return;
        }
        self.entries.insert(0, value.to_string());
        self.entries.truncate(HISTORY_MAX);
    }

    pub fn remove(&mut self, value: &str) -> bool {
        match self.rank(value) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }
}

/// Named MRU lists, created lazily on first push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyedHistory {
    lists: BTreeMap<String, HistoryStore>,
}

impl KeyedHistory {
    pub fn get(&self, key: &str) -> Option<&HistoryStore> {
        self.lists.get(key)
    }

    pub fn values(&self, key: &str) -> &[String] {
        self.lists.get(key).map(HistoryStore::entries).unwrap_or(&[])
    }

    pub fn latest(&self, key: &str) -> Option<&str> {
        self.lists.get(key).and_then(HistoryStore::latest)
    }

    pub fn push(&mut self, key: &str, value: &str) {
        self.lists.entry(key.to_string()).or_default().push(value);
    }

    /// Remove one value. The key stays, possibly with an empty list.
    pub fn remove(&mut self, key: &str, value: &str) -> bool {
        self.lists.get_mut(key).is_some_and(|h| h.remove(value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn store(v: &[&str]) -> HistoryStore {
        HistoryStore::from_entries(v.iter().map(|s| s.to_string()))
    }

    #[test]
    fn commit_existing_moves_to_front() {
        let mut h = store(&["b", "a", "c"]);
        h.push("a");
        assert_eq!(h.entries(), ["a", "b", "c"]);
    }

    #[test]
    fn push_new_goes_first() {
        let mut h = store(&["b"]);
        h.push("z");
        assert_eq!(h.entries(), ["z", "b"]);
        assert_eq!(h.rank("b"), Some(1));
        assert_eq!(h.latest(), Some("z"));
    }

    #[test]
    fn loading_dedupes_keeping_first() {
        let h: HistoryStore = serde_json::from_str(r#"["a","b","a","c","b"]"#).unwrap();
        assert_eq!(h.entries(), ["a", "b", "c"]);
    }

    #[test]
    fn keyed_history_roundtrips_as_plain_object() {
        let mut k = KeyedHistory::default();
        k.push("HOST", "a");
        k.push("HOST", "b");
        k.push("PORT", "22");
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, r#"{"HOST":["b","a"],"PORT":["22"]}"#);
        assert!(k.remove("PORT", "22"));
        assert!(k.values("PORT").is_empty());
        assert!(!k.remove("NOPE", "x"));
    }

    proptest! {
        #[test]
        fn push_never_duplicates(ops in prop::collection::vec("[a-e]", 0..50)) {
            let mut h = HistoryStore::default();
            for op in &ops {
                let before = h.len();
                let existed = h.rank(op).is_some();
                h.push(op);
                prop_assert_eq!(h.entries()[0].as_str(), op.as_str());
                prop_assert_eq!(h.len(), if existed { before } else { before + 1 });
                let mut sorted = h.entries().to_vec();
                sorted.sort();
                sorted.dedup();
                prop_assert_eq!(sorted.len(), h.len());
            }
        }
    }
}
