//! Identifier grouping by prefix
//!
//! Identifiers are split at the first delimiter into a prefix and a suffix,
//! e.g. `"user+42"` becomes `("user", "42")`. An identifier without the
//! delimiter is its own prefix with an empty suffix. The index lets the
//! façade delete every interval of a group in one call.

use ahash::{AHashMap, AHashSet};

/// Split `id` at the first `delim`.
pub fn split_id(id: &str, delim: char) -> (&str, &str) {
    id.split_once(delim).unwrap_or((id, ""))
}

/// Prefix → set of full identifiers
#[derive(Debug, Clone, Default)]
pub struct PrefixIndex {
    groups: AHashMap<String, AHashSet<String>>,
}

impl PrefixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str, delim: char) {
        let (prefix, _) = split_id(id, delim);
        self.groups
            .entry(prefix.to_string())
            .or_default()
            .insert(id.to_string());
    }

    /// Returns whether `id` was present. Empty groups are dropped.
    pub fn remove(&mut self, id: &str, delim: char) -> bool {
        let (prefix, _) = split_id(id, delim);
        let Some(group) = self.groups.get_mut(prefix) else {
            return false;
        };
        let removed = group.remove(id);
        if group.is_empty() {
            self.groups.remove(prefix);
        }
        removed
    }

    pub fn contains(&self, id: &str, delim: char) -> bool {
        let (prefix, _) = split_id(id, delim);
        self.groups
            .get(prefix)
            .is_some_and(|group| group.contains(id))
    }

    /// Full identifiers grouped under `prefix`
    pub fn ids_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.groups
            .get(prefix)
            .map(|group| group.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of prefix groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}
