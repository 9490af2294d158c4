//! Interval index façade
//!
//! [`IntervalIndex`] is the public store. It owns the augmented tree, a map
//! from identifier to tree handle, the prefix index used for bulk deletes,
//! and the snapshot schedule (a mutation counter compared against the
//! configured threshold).

use std::path::{Path, PathBuf};

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::error::Error;
use crate::interval::{Interval, IntervalTree, NodeId, TopKIterator};
use crate::persist::{self, Endpoint};
use crate::prefix::PrefixIndex;

/// Interval store with ranked overlap queries
pub struct IntervalIndex<K: Endpoint = String> {
    tree: IntervalTree<K>,
    /// Primary store: id -> tree node holding the record
    ids: AHashMap<String, NodeId>,
    prefixes: PrefixIndex,
    config: IndexConfig,
    /// Mutations since the last snapshot
    pending: u32,
}

impl<K: Endpoint> IntervalIndex<K> {
    /// In-memory index with default settings
    pub fn new() -> Self {
        Self::with_config(IndexConfig::default())
    }

    /// Index with `config`, without touching the snapshot file
    pub fn with_config(config: IndexConfig) -> Self {
        Self {
            tree: IntervalTree::new(),
            ids: AHashMap::new(),
            prefixes: PrefixIndex::new(),
            config,
            pending: 0,
        }
    }

    /// Validate `config` and, if it names a snapshot with `load_on_open`,
    /// load it. A missing snapshot yields an empty index.
    pub fn open(config: IndexConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut index = Self::with_config(config);

        let load_from = index
            .config
            .sync_file
            .clone()
            .filter(|_| index.config.load_on_open);
        if let Some(path) = load_from {
            if path.exists() {
                index.load(&path)?;
            } else {
                debug!(path = %path.display(), "no snapshot to load");
            }
        }
        Ok(index)
    }

    fn load(&mut self, path: &Path) -> Result<(), Error> {
        let records = persist::read_snapshot::<K>(path)?;
        let count = records.len();
        for record in records {
            if record.id.is_empty() {
                warn!(path = %path.display(), "skipping snapshot record with empty id");
                continue;
            }
            self.replace(record)?;
        }
        // Loaded records already match the snapshot
        self.pending = 0;
        debug!(path = %path.display(), records = count, "snapshot loaded");
        Ok(())
    }

    /// Insert or fully replace the interval `id`.
    ///
    /// Fails without effect on an empty id, on an id or endpoint whose text
    /// contains a line break, or while an iterator holds the tree.
    pub fn insert(&mut self, id: impl Into<String>, low: K, high: K, rank: u64) -> Result<(), Error> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::EmptyId);
        }
        persist::check_id(&id)?;
        persist::check_endpoint(&low)?;
        persist::check_endpoint(&high)?;
        if self.tree.is_bound() {
            return Err(Error::TreeBound);
        }

        let replaced = self.replace(Interval::new(id, low, high, rank))?;
        self.record_mutations(if replaced { 2 } else { 1 });
        Ok(())
    }

    /// Remove any interval with the same id, then insert `record`.
    fn replace(&mut self, record: Interval<K>) -> Result<bool, Error> {
        let replaced = match self.ids.get(&record.id) {
            Some(&old) => {
                self.tree.remove(old)?;
                debug!(id = %record.id, "replacing interval");
                true
            }
            None => {
                self.prefixes.add(&record.id, self.config.id_delimiter);
                false
            }
        };
        let id = record.id.clone();
        let node = self.tree.insert(record)?;
        self.ids.insert(id, node);
        Ok(replaced)
    }

    /// Remove the interval `id`. Returns `false` if there was none.
    pub fn delete(&mut self, id: &str) -> Result<bool, Error> {
        if self.tree.is_bound() {
            return Err(Error::TreeBound);
        }
        if !self.remove_entry(id)? {
            return Ok(false);
        }
        self.record_mutations(1);
        Ok(true)
    }

    fn remove_entry(&mut self, id: &str) -> Result<bool, Error> {
        let Some(&node) = self.ids.get(id) else {
            return Ok(false);
        };
        self.tree.remove(node)?;
        self.ids.remove(id);
        self.prefixes.remove(id, self.config.id_delimiter);
        Ok(true)
    }

    /// Remove every interval whose id prefix is `prefix`. Returns how many
    /// were removed.
    pub fn delete_prefix(&mut self, prefix: &str) -> Result<usize, Error> {
        if self.tree.is_bound() {
            return Err(Error::TreeBound);
        }
        let mut removed = 0;
        for id in self.prefixes.ids_with_prefix(prefix) {
            if self.remove_entry(&id)? {
                removed += 1;
                self.record_mutations(1);
            }
        }
        debug!(prefix, removed, "deleted interval group");
        Ok(removed)
    }

    /// The stored interval, or `None` when `id` is unknown
    pub fn lookup(&self, id: &str) -> Option<&Interval<K>> {
        self.ids.get(id).map(|&node| self.tree.interval(node))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains_key(id)
    }

    /// Up to `k` intervals overlapping `[low, high]`, highest rank first.
    ///
    /// Scans every record; intended for small stores and ad hoc queries.
    /// [`iter_top`](Self::iter_top) is the scalable path.
    pub fn top_k(&self, low: &K, high: &K, k: usize) -> Vec<&Interval<K>> {
        let mut hits: Vec<&Interval<K>> = self
            .tree
            .iter()
            .map(|(_, interval)| interval)
            .filter(|interval| interval.overlaps_range(low, high))
            .collect();
        hits.sort_by(|a, b| a.rank_order(b));
        hits.truncate(k);
        hits
    }

    /// Start a best-first search over `[low, high]`.
    ///
    /// The index cannot be mutated until the iterator is dropped.
    pub fn iter_top(&self, low: K, high: K) -> Result<TopKIterator<'_, K>, Error> {
        let mut it = TopKIterator::new(&self.tree);
        it.start(low, high)?;
        Ok(it)
    }

    /// Write a snapshot now. Without a sync file this only resets the
    /// mutation counter.
    pub fn sync(&mut self) -> Result<(), Error> {
        if let Some(path) = &self.config.sync_file {
            persist::write_snapshot(path, self.tree.iter().map(|(_, interval)| interval))?;
        }
        self.pending = 0;
        Ok(())
    }

    fn record_mutations(&mut self, count: u32) {
        self.pending = self.pending.saturating_add(count);
        if self.pending > self.config.sync_threshold {
            if let Err(e) = self.sync() {
                warn!(error = %e, pending = self.pending, "automatic snapshot failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Records in ascending low-endpoint order
    pub fn records(&self) -> impl Iterator<Item = &Interval<K>> + '_ {
        self.tree.iter().map(|(_, interval)| interval)
    }

    /// The underlying tree, e.g. to drive a [`TopKIterator`] by hand
    pub fn tree(&self) -> &IntervalTree<K> {
        &self.tree
    }

    /// Mutations not yet written to a snapshot
    pub fn pending_mutations(&self) -> u32 {
        self.pending
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn sync_file(&self) -> Option<&Path> {
        self.config.sync_file.as_deref()
    }

    pub fn set_sync_file(&mut self, path: Option<PathBuf>) {
        self.config.sync_file = path;
    }

    pub fn sync_threshold(&self) -> u32 {
        self.config.sync_threshold
    }

    pub fn set_sync_threshold(&mut self, threshold: u32) {
        self.config.sync_threshold = threshold;
    }

    pub fn id_delimiter(&self) -> char {
        self.config.id_delimiter
    }

    /// Change the id delimiter and regroup every stored id.
    pub fn set_id_delimiter(&mut self, delim: char) -> Result<(), Error> {
        let candidate = IndexConfig {
            id_delimiter: delim,
            ..self.config.clone()
        };
        candidate.validate()?;
        self.config.id_delimiter = delim;

        self.prefixes.clear();
        for id in self.ids.keys() {
            self.prefixes.add(id, delim);
        }
        Ok(())
    }
}

impl<K: Endpoint> Default for IntervalIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Endpoint> Drop for IntervalIndex<K> {
    fn drop(&mut self) {
        if !self.config.sync_on_drop || self.pending == 0 || self.config.sync_file.is_none() {
            return;
        }
        if let Err(e) = self.sync() {
            warn!(error = %e, "final snapshot failed");
        }
    }
}
