//! ranktree: ranked interval index
//!
//! This crate stores intervals over any ordered key domain, each tagged with
//! a rank (typically a timestamp), and answers overlap queries in rank
//! order. The core is an augmented red-black tree keyed by low endpoint that
//! tracks, per subtree, the largest high endpoint and the largest rank; a
//! best-first iterator uses both to produce the top-k overlapping intervals
//! without collecting the full overlap set.
//!
//! ```
//! use ranktree::IntervalIndex;
//!
//! let mut index: IntervalIndex<i64> = IntervalIndex::new();
//! index.insert("a", 1, 10, 5).unwrap();
//! index.insert("b", 5, 8, 9).unwrap();
//! index.insert("c", 20, 30, 1).unwrap();
//!
//! let ids: Vec<_> = index.iter_top(6, 7).unwrap().map(|i| i.id.clone()).collect();
//! assert_eq!(ids, ["b", "a"]);
//! ```

#![warn(missing_docs)]

/// Interval records, the augmented tree and the top-k iterator
pub mod interval;

/// The public store wrapping tree, id map, prefix index and snapshots
pub mod index;

/// Identifier grouping for bulk deletion
pub mod prefix;

/// Snapshot files
pub mod persist;

/// Randomized and property tests across tree, iterator and index
#[cfg(test)]
mod stress_tests;

// Re-exports
pub use config::IndexConfig;
pub use error::{Error, Result};
pub use index::IntervalIndex;
pub use interval::{
    Interval, IntervalTree, InvariantError, IterState, NodeId, TopKIterator, TreeStats, Window,
};
pub use persist::Endpoint;

/// Error types for ranktree operations
pub mod error {
    use std::io;

    use thiserror::Error;

    /// Error types that can occur in index operations
    #[derive(Debug, Error)]
    pub enum Error {
        /// An I/O error occurred
        #[error("I/O error: {0}")]
        Io(#[from] io::Error),
        /// Intervals need a non-empty identifier
        #[error("interval id must not be empty")]
        EmptyId,
        /// Identifiers are stored one per snapshot line
        #[error("interval id {0:?} contains a line break")]
        InvalidId(String),
        /// An endpoint's text form would split its snapshot line
        #[error("endpoint {0:?} contains a line break")]
        InvalidEndpoint(String),
        /// Low endpoint above the high endpoint
        #[error("low endpoint {low:?} is above high endpoint {high:?}")]
        InvertedInterval {
            /// Low endpoint as given
            low: String,
            /// High endpoint as given
            high: String,
        },
        /// A top-k iterator holds the tree
        #[error("interval tree is bound to an active top-k iterator")]
        TreeBound,
        /// A search was started on an empty tree
        #[error("interval tree is empty")]
        EmptyTree,
        /// A snapshot value failed to parse
        #[error("corrupt snapshot at line {line}: {reason}")]
        CorruptSnapshot {
            /// 1-based line of the bad value
            line: usize,
            /// Parser message
            reason: String,
        },
        /// Configuration error
        #[error("Configuration error: {0}")]
        ConfigError(String),
    }

    /// Result alias for index operations
    pub type Result<T> = std::result::Result<T, Error>;
}

/// Configuration options for an interval index
pub mod config {
    use std::path::{Path, PathBuf};

    use crate::error::Error;

    /// Configuration for an [`IntervalIndex`](crate::IntervalIndex)
    #[derive(Debug, Clone)]
    pub struct IndexConfig {
        /// Snapshot file; `None` keeps the index in memory only
        pub sync_file: Option<PathBuf>,
        /// Mutations allowed before an automatic snapshot
        pub sync_threshold: u32,
        /// Separates an id's group prefix from the rest
        pub id_delimiter: char,
        /// Load `sync_file` when opening
        pub load_on_open: bool,
        /// Write a final snapshot on drop if mutations are pending
        pub sync_on_drop: bool,
    }

    impl Default for IndexConfig {
        fn default() -> Self {
            Self {
                sync_file: None,
                sync_threshold: 10_000,
                id_delimiter: '+',
                load_on_open: true,
                sync_on_drop: true,
            }
        }
    }

    impl IndexConfig {
        /// Default settings backed by a snapshot at `path`
        pub fn persistent(path: impl AsRef<Path>) -> Self {
            Self {
                sync_file: Some(path.as_ref().to_path_buf()),
                ..Self::default()
            }
        }

        /// Reject settings the snapshot format cannot represent.
        pub fn validate(&self) -> Result<(), Error> {
            if self.id_delimiter == '\n' || self.id_delimiter == '\r' {
                return Err(Error::ConfigError(
                    "id delimiter cannot be a line break".to_string(),
                ));
            }
            if self
                .sync_file
                .as_ref()
                .is_some_and(|p| p.as_os_str().is_empty())
            {
                return Err(Error::ConfigError("sync file path is empty".to_string()));
            }
            Ok(())
        }
    }
}
