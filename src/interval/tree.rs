//! Augmented red-black interval tree
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. The tree is
//! ordered by each interval's low endpoint and every node carries two
//! subtree aggregates: the maximum high endpoint and the maximum rank. The
//! first lets overlap searches skip subtrees that end before the query
//! window, the second lets the top-k iterator expand subtrees best-first.
//!
//! Rotations only relink two nodes, so they recompute exactly those two
//! nodes' aggregates. Removal can shrink an ancestor's maximum, so after a
//! splice the aggregates are recomputed on the whole path to the root.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;

use smallvec::SmallVec;
use thiserror::Error as ThisError;

use super::record::Interval;
use crate::error::Error;

/// Traversal stacks stay inline for any tree a 64-bit address space can hold.
type Stack = SmallVec<[NodeId; 64]>;

/// Stable handle to a node in an [`IntervalTree`]
///
/// A handle is valid until the node it names is removed; slots are reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red,
    Black,
}

impl Color {
    fn as_char(self) -> char {
        match self {
            Color::Red => 'R',
            Color::Black => 'B',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn flip(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone)]
struct Node<K> {
    interval: Interval<K>,
    max_high: K,
    max_rank: u64,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
    color: Color,
}

/// Red-black tree of intervals keyed by low endpoint
pub struct IntervalTree<K> {
    /// Node arena; `None` marks a free slot
    slots: Vec<Option<Node<K>>>,
    /// Free slot indices for reuse
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
    /// Set while a top-k iterator is bound to this tree
    bound: Cell<bool>,
}

impl<K> IntervalTree<K> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            root: None,
            len: 0,
            bound: Cell::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The interval stored at `id`, or `None` for a free slot
    pub fn get(&self, id: NodeId) -> Option<&Interval<K>> {
        self.slots
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .map(|node| &node.interval)
    }

    /// The interval stored at `id`. Panics on a stale handle.
    pub fn interval(&self, id: NodeId) -> &Interval<K> {
        &self.node(id).interval
    }

    pub fn max_high(&self, id: NodeId) -> &K {
        &self.node(id).max_high
    }

    pub fn max_rank(&self, id: NodeId) -> u64 {
        self.node(id).max_rank
    }

    pub fn color(&self, id: NodeId) -> Color {
        self.node(id).color
    }

    pub fn left(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).left
    }

    pub fn right(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).right
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Leftmost node of the subtree rooted at `id`
    pub fn min_of(&self, id: NodeId) -> NodeId {
        let mut x = id;
        while let Some(l) = self.node(x).left {
            x = l;
        }
        x
    }

    /// In-order successor of `id`
    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(r) = self.node(id).right {
            return Some(self.min_of(r));
        }
        let mut x = id;
        let mut y = self.node(x).parent;
        while let Some(p) = y {
            if self.node(p).right != Some(x) {
                break;
            }
            x = p;
            y = self.node(p).parent;
        }
        y
    }

    /// In-order walk, ascending by low endpoint
    pub fn iter(&self) -> InOrder<'_, K> {
        let mut iter = InOrder {
            tree: self,
            stack: Stack::new(),
        };
        iter.push_left(self.root);
        iter
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn height(&self) -> usize {
        let mut best = 0;
        let mut stack: SmallVec<[(NodeId, usize); 64]> = SmallVec::new();
        if let Some(r) = self.root {
            stack.push((r, 1));
        }
        while let Some((x, depth)) = stack.pop() {
            best = best.max(depth);
            let node = self.node(x);
            for child in [node.left, node.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        best
    }

    /// Breadth-first rendering of the tree's shape, one line per depth
    pub fn level_order(&self) -> LevelOrder<'_, K> {
        LevelOrder { tree: self }
    }

    pub fn stats(&self) -> TreeStats {
        let mut black_height = 0;
        let mut x = self.root;
        while let Some(id) = x {
            if self.node(id).color == Color::Black {
                black_height += 1;
            }
            x = self.node(id).left;
        }
        TreeStats {
            node_count: self.len,
            height: self.height(),
            black_height,
            arena_capacity: self.slots.len(),
        }
    }

    /// Whether a top-k iterator currently holds this tree
    pub fn is_bound(&self) -> bool {
        self.bound.get()
    }

    /// Claim the binding. Fails if it is already held.
    pub(crate) fn try_bind(&self) -> bool {
        if self.bound.get() {
            return false;
        }
        self.bound.set(true);
        true
    }

    pub(crate) fn release_binding(&self) {
        self.bound.set(false);
    }

    fn ensure_unbound(&self) -> Result<(), Error> {
        if self.bound.get() {
            return Err(Error::TreeBound);
        }
        Ok(())
    }

    fn node(&self, id: NodeId) -> &Node<K> {
        match self.slots.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale interval tree handle {:?}", id),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K> {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale interval tree handle {:?}", id),
        }
    }

    fn alloc(&mut self, node: Node<K>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id.0] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    fn dealloc(&mut self, id: NodeId) -> Node<K> {
        match self.slots.get_mut(id.0).and_then(Option::take) {
            Some(node) => {
                self.free.push(id);
                node
            }
            None => panic!("stale interval tree handle {:?}", id),
        }
    }

    fn is_red(&self, id: Option<NodeId>) -> bool {
        id.is_some_and(|x| self.node(x).color == Color::Red)
    }

    fn set_color(&mut self, id: Option<NodeId>, color: Color) {
        if let Some(x) = id {
            self.node_mut(x).color = color;
        }
    }

    fn child(&self, id: NodeId, side: Side) -> Option<NodeId> {
        let node = self.node(id);
        match side {
            Side::Left => node.left,
            Side::Right => node.right,
        }
    }

    fn set_child(&mut self, id: NodeId, side: Side, child: Option<NodeId>) {
        let node = self.node_mut(id);
        match side {
            Side::Left => node.left = child,
            Side::Right => node.right = child,
        }
    }

    /// Point `parent`'s link to `old` at `new` instead; `None` means the root.
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                if self.node(p).left == Some(old) {
                    self.node_mut(p).left = new;
                } else {
                    self.node_mut(p).right = new;
                }
            }
        }
    }

    /// Put `v` where `u` hangs from its parent.
    fn transplant(&mut self, u: NodeId, v: Option<NodeId>) {
        let parent = self.node(u).parent;
        self.replace_child(parent, u, v);
        if let Some(v) = v {
            self.node_mut(v).parent = parent;
        }
    }
}

impl<K: Ord + Clone> IntervalTree<K> {
    /// Insert `interval` and return its node handle.
    ///
    /// Equal low endpoints descend to the right, so equal keys keep their
    /// insertion order in an in-order walk.
    pub fn insert(&mut self, interval: Interval<K>) -> Result<NodeId, Error> {
        self.ensure_unbound()?;

        let mut parent = None;
        let mut cursor = self.root;
        let mut side = Side::Left;
        while let Some(x) = cursor {
            parent = Some(x);
            // A new leaf can only raise its ancestors' maxima
            let node = self.node_mut(x);
            if node.max_high < interval.high {
                node.max_high = interval.high.clone();
            }
            node.max_rank = node.max_rank.max(interval.rank);

            side = if interval.low < node.interval.low {
                Side::Left
            } else {
                Side::Right
            };
            cursor = self.child(x, side);
        }

        let z = self.alloc(Node {
            max_high: interval.high.clone(),
            max_rank: interval.rank,
            interval,
            left: None,
            right: None,
            parent,
            color: Color::Red,
        });
        match parent {
            None => self.root = Some(z),
            Some(p) => self.set_child(p, side, Some(z)),
        }
        self.len += 1;

        self.insert_fixup(z);
        Ok(z)
    }

    /// Remove the node `z` and hand back its interval.
    ///
    /// `z` must be a live handle returned by this tree.
    pub fn remove(&mut self, z: NodeId) -> Result<Interval<K>, Error> {
        self.ensure_unbound()?;

        let (z_left, z_right, z_parent) = {
            let node = self.node(z);
            (node.left, node.right, node.parent)
        };
        let mut removed_color = self.node(z).color;
        let x;
        let x_parent;

        match (z_left, z_right) {
            (None, _) => {
                x = z_right;
                x_parent = z_parent;
                self.transplant(z, z_right);
            }
            (Some(_), None) => {
                x = z_left;
                x_parent = z_parent;
                self.transplant(z, z_left);
            }
            (Some(l), Some(r)) => {
                let y = self.min_of(r);
                removed_color = self.node(y).color;
                x = self.node(y).right;
                if self.node(y).parent == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.node(y).parent;
                    self.transplant(y, x);
                    self.node_mut(y).right = Some(r);
                    self.node_mut(r).parent = Some(y);
                }
                self.transplant(z, Some(y));
                self.node_mut(y).left = Some(l);
                self.node_mut(l).parent = Some(y);
                self.node_mut(y).color = self.node(z).color;
            }
        }

        // x_parent is the lowest node whose subtree changed; everything
        // above it may have lost its maximum.
        self.refresh_to_root(x_parent);

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }

        self.len -= 1;
        Ok(self.dealloc(z).interval)
    }

    /// Remove every node, keeping the arena allocation.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.ensure_unbound()?;
        self.slots.clear();
        self.free.clear();
        self.root = None;
        self.len = 0;
        Ok(())
    }

    /// Recompute `x`'s aggregates from its own interval and its children.
    fn refresh(&mut self, x: NodeId) {
        let node = self.node(x);
        let mut max_high = &node.interval.high;
        let mut max_rank = node.interval.rank;
        for child in [node.left, node.right].into_iter().flatten() {
            let c = self.node(child);
            if c.max_high > *max_high {
                max_high = &c.max_high;
            }
            max_rank = max_rank.max(c.max_rank);
        }
        let max_high = max_high.clone();

        let node = self.node_mut(x);
        node.max_high = max_high;
        node.max_rank = max_rank;
    }

    fn refresh_to_root(&mut self, from: Option<NodeId>) {
        let mut cursor = from;
        while let Some(x) = cursor {
            self.refresh(x);
            cursor = self.node(x).parent;
        }
    }

    /// Rotate `x` down toward `side`; its child on the other side rises.
    /// `rotate(x, Side::Left)` is the classic left rotation.
    fn rotate(&mut self, x: NodeId, side: Side) {
        let Some(y) = self.child(x, side.flip()) else {
            return;
        };
        let inner = self.child(y, side);

        self.set_child(x, side.flip(), inner);
        if let Some(b) = inner {
            self.node_mut(b).parent = Some(x);
        }

        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        self.replace_child(x_parent, x, Some(y));

        self.set_child(y, side, Some(x));
        self.node_mut(x).parent = Some(y);

        // x is now below y
        self.refresh(x);
        self.refresh(y);
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        loop {
            let Some(p) = self.node(z).parent else { break };
            if self.node(p).color != Color::Red {
                break;
            }
            // A red parent is never the root, so the grandparent exists
            let Some(g) = self.node(p).parent else { break };
            let p_side = if self.node(g).left == Some(p) {
                Side::Left
            } else {
                Side::Right
            };
            let uncle = self.child(g, p_side.flip());

            if self.is_red(uncle) {
                self.node_mut(p).color = Color::Black;
                self.set_color(uncle, Color::Black);
                self.node_mut(g).color = Color::Red;
                z = g;
            } else {
                if self.child(p, p_side.flip()) == Some(z) {
                    z = p;
                    self.rotate(z, p_side);
                }
                let Some(p) = self.node(z).parent else { break };
                self.node_mut(p).color = Color::Black;
                self.node_mut(g).color = Color::Red;
                self.rotate(g, p_side.flip());
            }
        }
        self.set_color(self.root, Color::Black);
    }

    /// `x` carries an extra black; `parent` is its parent since `x` may be
    /// an empty subtree.
    fn delete_fixup(&mut self, mut x: Option<NodeId>, mut parent: Option<NodeId>) {
        while x != self.root && !self.is_red(x) {
            let Some(p) = parent else { break };
            let side = if self.node(p).left == x {
                Side::Left
            } else {
                Side::Right
            };
            let other = side.flip();

            // The sibling subtree has black height >= 1, so it is not empty
            let Some(mut w) = self.child(p, other) else { break };

            if self.node(w).color == Color::Red {
                self.node_mut(w).color = Color::Black;
                self.node_mut(p).color = Color::Red;
                self.rotate(p, side);
                w = match self.child(p, other) {
                    Some(w) => w,
                    None => break,
                };
            }

            if !self.is_red(self.child(w, side)) && !self.is_red(self.child(w, other)) {
                self.node_mut(w).color = Color::Red;
                x = Some(p);
                parent = self.node(p).parent;
            } else {
                if !self.is_red(self.child(w, other)) {
                    self.set_color(self.child(w, side), Color::Black);
                    self.node_mut(w).color = Color::Red;
                    self.rotate(w, other);
                    w = match self.child(p, other) {
                        Some(w) => w,
                        None => break,
                    };
                }
                self.node_mut(w).color = self.node(p).color;
                self.node_mut(p).color = Color::Black;
                self.set_color(self.child(w, other), Color::Black);
                self.rotate(p, side);
                x = self.root;
                parent = None;
            }
        }
        self.set_color(x, Color::Black);
    }

    /// Check every structural invariant, returning the first violation.
    pub fn validate(&self) -> Result<TreeStats, InvariantError> {
        let Some(root) = self.root else {
            if self.len != 0 {
                return Err(InvariantError::LengthMismatch {
                    counted: 0,
                    recorded: self.len,
                });
            }
            return Ok(self.stats());
        };
        if self.node(root).parent.is_some() {
            return Err(InvariantError::BrokenParentLink(root));
        }
        if self.node(root).color != Color::Black {
            return Err(InvariantError::RedRoot);
        }

        let mut counted = 0;
        self.validate_subtree(root, &mut counted)?;
        if counted != self.len {
            return Err(InvariantError::LengthMismatch {
                counted,
                recorded: self.len,
            });
        }

        let mut prev: Option<&K> = None;
        for (id, interval) in self.iter() {
            if prev.is_some_and(|p| *p > interval.low) {
                return Err(InvariantError::OutOfOrder(id));
            }
            prev = Some(&interval.low);
        }

        Ok(self.stats())
    }

    /// Returns the black height of the subtree (empty subtree = 1).
    fn validate_subtree(&self, x: NodeId, counted: &mut usize) -> Result<usize, InvariantError> {
        *counted += 1;
        let node = self.node(x);

        let mut max_high = &node.interval.high;
        let mut max_rank = node.interval.rank;
        let mut heights = [1usize; 2];
        for (slot, child) in [node.left, node.right].into_iter().enumerate() {
            let Some(c) = child else { continue };
            let child_node = self.node(c);
            if child_node.parent != Some(x) {
                return Err(InvariantError::BrokenParentLink(c));
            }
            if node.color == Color::Red && child_node.color == Color::Red {
                return Err(InvariantError::RedRed(c));
            }
            heights[slot] = self.validate_subtree(c, counted)?;
            if child_node.max_high > *max_high {
                max_high = &child_node.max_high;
            }
            max_rank = max_rank.max(child_node.max_rank);
        }

        if node.max_high != *max_high || node.max_rank != max_rank {
            return Err(InvariantError::StaleAggregate(x));
        }
        if heights[0] != heights[1] {
            return Err(InvariantError::BlackHeight(x));
        }
        Ok(heights[0] + usize::from(node.color == Color::Black))
    }
}

impl<K> Default for IntervalTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug> fmt::Debug for IntervalTree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalTree")
            .field("len", &self.len)
            .field("root", &self.root)
            .field("bound", &self.bound.get())
            .finish()
    }
}

/// One node per line: `(id,low,high,rank):(max_high,max_rank,color,depth)`
impl<K: fmt::Display> fmt::Display for IntervalTree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack: SmallVec<[(NodeId, usize); 64]> = SmallVec::new();
        let mut cursor = self.root.map(|r| (r, 0));
        loop {
            while let Some((x, depth)) = cursor {
                stack.push((x, depth));
                cursor = self.node(x).left.map(|l| (l, depth + 1));
            }
            let Some((x, depth)) = stack.pop() else { break };
            let node = self.node(x);
            writeln!(
                f,
                "({},{},{},{}):({},{},{},{})",
                node.interval.id,
                node.interval.low,
                node.interval.high,
                node.interval.rank,
                node.max_high,
                node.max_rank,
                node.color.as_char(),
                depth
            )?;
            cursor = node.right.map(|r| (r, depth + 1));
        }
        Ok(())
    }
}

/// Level-order view returned by [`IntervalTree::level_order`]
///
/// Each line starts with the depth. A node renders as
/// `(id,low,high,rank):(max_high,max_rank,color)` followed by its children's
/// ids as `/left` and `\right`.
pub struct LevelOrder<'a, K> {
    tree: &'a IntervalTree<K>,
}

impl<K: fmt::Display> fmt::Display for LevelOrder<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tree = self.tree;
        let mut queue: VecDeque<(NodeId, usize)> = tree.root.map(|r| (r, 0)).into_iter().collect();
        let mut level = None;
        while let Some((x, depth)) = queue.pop_front() {
            if level != Some(depth) {
                if level.is_some() {
                    writeln!(f)?;
                }
                write!(f, "{}:", depth)?;
                level = Some(depth);
            }
            let node = tree.node(x);
            write!(
                f,
                " ({},{},{},{}):({},{},{})",
                node.interval.id,
                node.interval.low,
                node.interval.high,
                node.interval.rank,
                node.max_high,
                node.max_rank,
                node.color.as_char()
            )?;
            if let Some(l) = node.left {
                queue.push_back((l, depth + 1));
                write!(f, "/{}", tree.node(l).interval.id)?;
            }
            if let Some(r) = node.right {
                queue.push_back((r, depth + 1));
                write!(f, "\\{}", tree.node(r).interval.id)?;
            }
        }
        if level.is_some() {
            writeln!(f)?;
        }
        Ok(())
    }
}

/// In-order iterator over `(handle, interval)` pairs
pub struct InOrder<'a, K> {
    tree: &'a IntervalTree<K>,
    stack: Stack,
}

impl<'a, K> InOrder<'a, K> {
    fn push_left(&mut self, mut cursor: Option<NodeId>) {
        while let Some(x) = cursor {
            self.stack.push(x);
            cursor = self.tree.node(x).left;
        }
    }
}

impl<'a, K> Iterator for InOrder<'a, K> {
    type Item = (NodeId, &'a Interval<K>);

    fn next(&mut self) -> Option<Self::Item> {
        let x = self.stack.pop()?;
        let tree: &'a IntervalTree<K> = self.tree;
        let node = tree.node(x);
        self.push_left(node.right);
        Some((x, &node.interval))
    }
}

/// Statistics about the tree shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeStats {
    pub node_count: usize,
    pub height: usize,
    /// Black nodes on any root-to-leaf path
    pub black_height: usize,
    /// Arena slots allocated, live or free
    pub arena_capacity: usize,
}

/// A violated tree invariant
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum InvariantError {
    #[error("node {0:?} is out of low-endpoint order")]
    OutOfOrder(NodeId),
    #[error("node {0:?} has stale max_high/max_rank")]
    StaleAggregate(NodeId),
    #[error("root is red")]
    RedRoot,
    #[error("red node {0:?} has a red parent")]
    RedRed(NodeId),
    #[error("black height differs below node {0:?}")]
    BlackHeight(NodeId),
    #[error("node {0:?} has a broken parent link")]
    BrokenParentLink(NodeId),
    #[error("reachable node count {counted} does not match recorded length {recorded}")]
    LengthMismatch { counted: usize, recorded: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn iv(id: &str, low: i64, high: i64, rank: u64) -> Interval<i64> {
        Interval::new(id, low, high, rank)
    }

    fn lows(tree: &IntervalTree<i64>) -> Vec<i64> {
        tree.iter().map(|(_, i)| i.low).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree: IntervalTree<i64> = IntervalTree::new();

        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.iter().count(), 0);
        tree.validate().unwrap();
    }

    #[test]
    fn test_single_insert_and_remove() {
        let mut tree = IntervalTree::new();

        let id = tree.insert(iv("a", 1, 10, 5)).unwrap();
        assert_eq!(tree.root(), Some(id));
        assert_eq!(tree.color(id), Color::Black);
        assert_eq!(*tree.max_high(id), 10);
        assert_eq!(tree.max_rank(id), 5);
        tree.validate().unwrap();

        let removed = tree.remove(id).unwrap();
        assert_eq!(removed.id, "a");
        assert!(tree.is_empty());
        assert_eq!(tree.get(id), None);
        tree.validate().unwrap();
    }

    #[test]
    fn test_sorted_inserts_stay_balanced() {
        let mut tree = IntervalTree::new();

        for i in 0..1024 {
            tree.insert(iv(&i.to_string(), i, i + 5, i as u64)).unwrap();
            tree.validate().unwrap();
        }

        let stats = tree.validate().unwrap();
        assert_eq!(stats.node_count, 1024);
        // Red-black bound: height <= 2 * log2(n + 1)
        assert!(stats.height <= 20, "height {}", stats.height);
        assert_eq!(lows(&tree), (0..1024).collect::<Vec<_>>());
    }

    #[test]
    fn test_aggregates_track_subtree_maxima() {
        let mut tree = IntervalTree::new();
        tree.insert(iv("a", 1, 10, 5)).unwrap();
        tree.insert(iv("b", 5, 8, 9)).unwrap();
        let c = tree.insert(iv("c", 20, 30, 1)).unwrap();

        let root = tree.root().unwrap();
        assert_eq!(*tree.max_high(root), 30);
        assert_eq!(tree.max_rank(root), 9);
        tree.validate().unwrap();

        // Removing the widest interval must shrink max_high above it
        tree.remove(c).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(*tree.max_high(root), 10);
        assert_eq!(tree.max_rank(root), 9);
        tree.validate().unwrap();
    }

    #[test]
    fn test_leaf_removal_shrinks_ancestors() {
        let mut tree = IntervalTree::new();
        let ids: Vec<NodeId> = (0..7)
            .map(|i| tree.insert(iv(&i.to_string(), i * 10, i * 10 + 1, i as u64)).unwrap())
            .collect();
        // Give a leaf the global maxima, then remove it
        let hot = tree.insert(iv("hot", 65, 1000, 1000)).unwrap();
        assert_eq!(*tree.max_high(tree.root().unwrap()), 1000);

        tree.remove(hot).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(*tree.max_high(root), 61);
        assert_eq!(tree.max_rank(root), 6);
        tree.validate().unwrap();
        assert_eq!(tree.len(), ids.len());
    }

    #[test]
    fn test_remove_node_with_two_children() {
        let mut tree = IntervalTree::new();
        let mut ids = Vec::new();
        for low in [50, 30, 70, 20, 40, 60, 80, 35, 45] {
            ids.push(tree.insert(iv(&low.to_string(), low, low + 3, low as u64)).unwrap());
        }

        let root = tree.root().unwrap();
        assert!(tree.left(root).is_some() && tree.right(root).is_some());
        let successor = tree.successor(root).unwrap();
        let successor_low = tree.interval(successor).low;

        tree.remove(root).unwrap();
        tree.validate().unwrap();
        assert_eq!(tree.interval(tree.root().unwrap()).low, successor_low);
        assert_eq!(lows(&tree), vec![20, 30, 35, 40, 45, 60, 70, 80]);
    }

    #[test]
    fn test_equal_lows_keep_insertion_order() {
        let mut tree = IntervalTree::new();
        for (i, name) in ["first", "second", "third", "fourth"].iter().enumerate() {
            tree.insert(iv(name, 7, 7 + i as i64, i as u64)).unwrap();
        }

        let names: Vec<&str> = tree.iter().map(|(_, i)| i.id.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third", "fourth"]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_min_and_successor_walk() {
        let mut tree = IntervalTree::new();
        for low in [5, 3, 8, 1, 4, 7, 9] {
            tree.insert(iv(&low.to_string(), low, low, 0)).unwrap();
        }

        let mut walk = Vec::new();
        let mut cursor = tree.root().map(|r| tree.min_of(r));
        while let Some(x) = cursor {
            walk.push(tree.interval(x).low);
            cursor = tree.successor(x);
        }
        assert_eq!(walk, vec![1, 3, 4, 5, 7, 8, 9]);
    }

    #[test]
    fn test_slots_are_reused() {
        let mut tree = IntervalTree::new();
        let a = tree.insert(iv("a", 1, 2, 0)).unwrap();
        tree.insert(iv("b", 3, 4, 0)).unwrap();
        tree.remove(a).unwrap();

        let c = tree.insert(iv("c", 5, 6, 0)).unwrap();
        assert_eq!(c, a);
        assert_eq!(tree.stats().arena_capacity, 2);
        assert_eq!(tree.interval(c).id, "c");
    }

    #[test]
    fn test_bound_tree_rejects_mutation() {
        let mut tree = IntervalTree::new();
        let a = tree.insert(iv("a", 1, 2, 0)).unwrap();

        assert!(tree.try_bind());
        assert!(!tree.try_bind());
        assert!(matches!(tree.insert(iv("b", 3, 4, 0)), Err(Error::TreeBound)));
        assert!(matches!(tree.remove(a), Err(Error::TreeBound)));
        assert_eq!(tree.len(), 1);

        tree.release_binding();
        tree.remove(a).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_random_insert_remove_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = IntervalTree::new();
        let mut live: Vec<NodeId> = Vec::new();

        for step in 0..4000 {
            if live.is_empty() || rng.gen_bool(0.6) {
                let low = rng.gen_range(0..500);
                let high = low + rng.gen_range(0..50);
                let rank = rng.gen_range(0..10_000);
                live.push(tree.insert(iv(&step.to_string(), low, high, rank)).unwrap());
            } else {
                let victim = live.swap_remove(rng.gen_range(0..live.len()));
                tree.remove(victim).unwrap();
            }
            if step % 25 == 0 {
                tree.validate().unwrap();
            }
        }

        let stats = tree.validate().unwrap();
        assert_eq!(stats.node_count, live.len());
        let bound = 2.0 * ((live.len() + 1) as f64).log2();
        assert!((stats.height as f64) <= bound, "height {} > {}", stats.height, bound);
    }

    #[test]
    fn test_display_lists_nodes_in_order() {
        let mut tree = IntervalTree::new();
        tree.insert(iv("b", 5, 8, 9)).unwrap();
        tree.insert(iv("a", 1, 10, 5)).unwrap();

        let rendered = tree.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "(a,1,10,5):(10,5,R,1)");
        assert_eq!(lines[1], "(b,5,8,9):(10,9,B,0)");
    }

    #[test]
    fn test_level_order_shows_shape() {
        let mut tree = IntervalTree::new();
        assert_eq!(tree.level_order().to_string(), "");

        tree.insert(iv("b", 5, 8, 9)).unwrap();
        tree.insert(iv("a", 1, 10, 5)).unwrap();
        tree.insert(iv("c", 20, 30, 1)).unwrap();

        let rendered = tree.level_order().to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0: (b,5,8,9):(30,9,B)/a\\c",
                "1: (a,1,10,5):(10,5,R) (c,20,30,1):(30,1,R)",
            ]
        );
    }

    #[test]
    fn test_clear() {
        let mut tree = IntervalTree::new();
        for i in 0..10 {
            tree.insert(iv(&i.to_string(), i, i, 0)).unwrap();
        }
        tree.clear().unwrap();
        assert!(tree.is_empty());
        tree.validate().unwrap();
    }
}
