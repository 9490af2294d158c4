//! Interval module
//!
//! This module provides the interval record, the augmented red-black tree
//! that stores records ordered by low endpoint, and the best-first iterator
//! that reads the tree in rank order.

pub mod record;
pub mod topk;
pub mod tree;

// Re-export key types
pub use record::{Interval, Window};
pub use topk::{IterState, TopKIterator};
pub use tree::{Color, InOrder, IntervalTree, InvariantError, LevelOrder, NodeId, TreeStats};
