//! Order-preserving token filter.
//!
//! A query is split on whitespace into tokens; an item matches when every token occurs in the
//! item's display string as a case-insensitive substring. The result lists matching indices in
//! the original item order. There is no scoring: pagination and selection arithmetic in the
//! menu rely on the order being stable.

/// A parsed query, reusable across many items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    tokens: Vec<String>,
}

impl Query {
    pub fn new(query: &str) -> Self {
        Self {
            tokens: query.split_whitespace().map(str::to_lowercase).collect(),
        }
    }

    /// True when the query has no tokens (matches everything).
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn matches(&self, haystack: &str) -> bool {
        if self.tokens.is_empty() {
            return true;
        }
        let lowered = haystack.to_lowercase();
        self.tokens.iter().all(|t| lowered.contains(t.as_str()))
    }
}

/// Indices of the items matching `query`, ascending.
pub fn match_indices<I, S>(items: I, query: &str) -> Vec<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let q = Query::new(query);
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, s)| q.matches(s.as_ref()).then_some(i))
        .collect()
}
