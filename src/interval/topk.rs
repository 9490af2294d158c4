//! Best-first top-k overlap iterator
//!
//! [`TopKIterator`] enumerates the intervals overlapping a query window in
//! non-increasing rank order without collecting the whole overlap set first.
//! The frontier is a max-heap holding two kinds of entries:
//!
//! - a *subtree* entry, keyed by the subtree's `max_rank`, not yet expanded
//! - a *hit* entry, keyed by one overlapping node's own rank
//!
//! Every key is an upper bound on the rank of anything still reachable
//! through that entry, so when a hit reaches the top of the heap nothing
//! left in the frontier can outrank it.
//!
//! Subtrees whose `max_high` lies below the window are never queued, and a
//! right subtree is skipped once its parent's low endpoint is past the
//! window, since every low in it is at least that large.
//!
//! The iterator borrows its tree and additionally claims the tree's binding
//! flag, so at most one iterator is active per tree and the tree refuses
//! mutation until the binding is released:
//!
//! ```compile_fail
//! use ranktree::{Interval, IntervalTree, TopKIterator};
//!
//! let mut tree = IntervalTree::new();
//! tree.insert(Interval::new("a", 1, 10, 5)).unwrap();
//! let mut it = TopKIterator::new(&tree);
//! it.start(6, 7).unwrap();
//! tree.insert(Interval::new("b", 5, 8, 9)).unwrap();
//! it.next();
//! ```

use std::collections::BinaryHeap;

use tracing::trace;

use super::record::{Interval, Window};
use super::tree::{IntervalTree, NodeId};
use crate::error::Error;

/// Lifecycle of a [`TopKIterator`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterState {
    /// Not started
    Idle,
    /// Bound and producing results
    Active,
    /// Frontier drained; no more results for this window
    Exhausted,
    /// Stopped early by the caller
    Stopped,
}

/// Heap entry. Derived ordering compares `rank`, then prefers hits on
/// equal rank, then falls back to the node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    rank: u64,
    hit: bool,
    node: NodeId,
}

/// Resumable best-first search over one [`IntervalTree`]
pub struct TopKIterator<'a, K> {
    tree: &'a IntervalTree<K>,
    window: Option<Window<K>>,
    frontier: BinaryHeap<Candidate>,
    state: IterState,
    holds_binding: bool,
    visited: usize,
}

impl<'a, K: Ord> TopKIterator<'a, K> {
    /// Create an idle iterator for `tree`. Nothing is claimed until
    /// [`start`](Self::start).
    pub fn new(tree: &'a IntervalTree<K>) -> Self {
        Self {
            tree,
            window: None,
            frontier: BinaryHeap::new(),
            state: IterState::Idle,
            holds_binding: false,
            visited: 0,
        }
    }

    /// Bind to the tree and begin a search over `[low, high]`.
    ///
    /// Fails with [`Error::EmptyTree`] if the tree has no intervals and with
    /// [`Error::TreeBound`] if another iterator holds the tree or this one
    /// is already active.
    pub fn start(&mut self, low: K, high: K) -> Result<(), Error> {
        if self.state == IterState::Active {
            return Err(Error::TreeBound);
        }
        if self.tree.is_empty() {
            return Err(Error::EmptyTree);
        }
        if !self.holds_binding {
            if !self.tree.try_bind() {
                return Err(Error::TreeBound);
            }
            self.holds_binding = true;
        }
        self.seed(Window::new(low, high));
        Ok(())
    }

    /// Search a new window, keeping the binding.
    pub fn restart(&mut self, low: K, high: K) -> Result<(), Error> {
        if !self.holds_binding {
            return self.start(low, high);
        }
        self.seed(Window::new(low, high));
        Ok(())
    }

    /// Drop the frontier. With `release` the tree becomes available to
    /// other iterators and to mutation again.
    pub fn stop(&mut self, release: bool) {
        self.frontier.clear();
        if self.state != IterState::Idle {
            self.state = IterState::Stopped;
        }
        if release && self.holds_binding {
            self.tree.release_binding();
            self.holds_binding = false;
        }
        trace!(release, visited = self.visited, "top-k iterator stopped");
    }

    pub fn state(&self) -> IterState {
        self.state
    }

    pub fn window(&self) -> Option<&Window<K>> {
        self.window.as_ref()
    }

    pub fn holds_binding(&self) -> bool {
        self.holds_binding
    }

    /// Nodes expanded since the last start or restart
    pub fn visited(&self) -> usize {
        self.visited
    }

    fn seed(&mut self, window: Window<K>) {
        self.frontier.clear();
        self.visited = 0;
        if let Some(root) = self.tree.root() {
            if *self.tree.max_high(root) >= window.low {
                self.frontier.push(Candidate {
                    rank: self.tree.max_rank(root),
                    hit: false,
                    node: root,
                });
            }
        }
        self.window = Some(window);
        self.state = IterState::Active;
        trace!(frontier = self.frontier.len(), "top-k iterator started");
    }

    /// Queue a child subtree if it can still reach the window.
    fn push_subtree(&mut self, child: Option<NodeId>, window_low: &K) {
        let Some(c) = child else { return };
        if *self.tree.max_high(c) >= *window_low {
            self.frontier.push(Candidate {
                rank: self.tree.max_rank(c),
                hit: false,
                node: c,
            });
        }
    }
}

impl<'a, K: Ord> Iterator for TopKIterator<'a, K> {
    type Item = &'a Interval<K>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != IterState::Active {
            return None;
        }
        let tree: &'a IntervalTree<K> = self.tree;
        let window = self.window.take()?;

        let mut found = None;
        while let Some(candidate) = self.frontier.pop() {
            if candidate.hit {
                found = Some(tree.interval(candidate.node));
                break;
            }

            self.visited += 1;
            let x = candidate.node;
            let interval = tree.interval(x);

            self.push_subtree(tree.left(x), &window.low);
            if interval.low <= window.high {
                self.push_subtree(tree.right(x), &window.low);
            }
            if interval.overlaps_window(&window) {
                self.frontier.push(Candidate {
                    rank: interval.rank,
                    hit: true,
                    node: x,
                });
            }
        }

        self.window = Some(window);
        if found.is_none() {
            self.state = IterState::Exhausted;
        }
        found
    }
}

impl<'a, K> Drop for TopKIterator<'a, K> {
    fn drop(&mut self) {
        if self.holds_binding {
            self.tree.release_binding();
        }
    }
}
