use smallvec::SmallVec;

use super::arena::Arena;
use super::handle::Handle;
use super::node::{InternalNode, LeafNode, Node, SearchResult};

/// One level of the descent stack: the internal node passed through and the
/// child index taken.
struct PathElement {
    node: Handle,
    child_index: usize,
}

/// Ancestor stack recorded on the way down. Rebalancing walks it back up;
/// parents are never rediscovered by re-descending.
type Path = SmallVec<[PathElement; 16]>;

/// The B+ tree engine backing [`Tree`](crate::Tree).
///
/// Every mutation descends from the root to the target leaf recording the
/// ancestor path, edits the leaf, then walks the path upward rebalancing:
/// split on overflow (`> 2 * order` keys), borrow-or-merge on underflow
/// (`<= order` keys on a non-root node).
#[derive(Clone, Debug)]
pub(crate) struct RawTree {
    nodes: Arena<Node>,
    root: Option<Handle>,
    order: usize,
    len: usize,
}

impl RawTree {
    pub(crate) fn new(order: usize) -> Self {
        debug_assert!(order > 0, "order is validated by the public constructor");
        Self { nodes: Arena::new(), root: None, order, len: 0 }
    }

    pub(crate) fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.len = 0;
    }

    #[inline]
    pub(crate) fn node(&self, handle: Handle) -> &Node {
        self.nodes.get(handle)
    }

    /// Levels from the root down to the leaves; 0 for an empty tree.
    pub(crate) fn height(&self) -> usize {
        let Some(mut current) = self.root else {
            return 0;
        };
        let mut height = 1;
        while let Node::Internal(internal) = self.nodes.get(current) {
            current = internal.child(0);
            height += 1;
        }
        height
    }

    pub(crate) fn leftmost_leaf(&self) -> Option<Handle> {
        let mut current = self.root?;
        while let Node::Internal(internal) = self.nodes.get(current) {
            current = internal.child(0);
        }
        Some(current)
    }

    pub(crate) fn rightmost_leaf(&self) -> Option<Handle> {
        let mut current = self.root?;
        while let Node::Internal(internal) = self.nodes.get(current) {
            current = internal.child(internal.child_count() - 1);
        }
        Some(current)
    }

    /// Exact lookup: the leaf and row index holding `key`, if present.
    fn search(&self, key: &[u8]) -> Option<(Handle, usize)> {
        let mut current = self.root?;
        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => current = internal.child(internal.child_for(key)),
                Node::Leaf(leaf) => {
                    return match leaf.search(key) {
                        SearchResult::Found(index) => Some((current, index)),
                        SearchResult::NotFound(_) => None,
                    };
                }
            }
        }
    }

    pub(crate) fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let (leaf, index) = self.search(key)?;
        Some(self.nodes.get(leaf).as_leaf().value(index))
    }

    /// Position of the smallest key `>= key`: the landing leaf and row
    /// index, hopping to the next leaf when the probe falls past the leaf's
    /// last key. `None` when every key in the tree is smaller.
    pub(crate) fn lower_bound(&self, key: &[u8]) -> Option<(Handle, usize)> {
        let mut current = self.root?;
        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => current = internal.child(internal.child_for(key)),
                Node::Leaf(leaf) => {
                    return match leaf.search(key) {
                        SearchResult::Found(index) => Some((current, index)),
                        SearchResult::NotFound(index) if index < leaf.key_count() => {
                            Some((current, index))
                        }
                        SearchResult::NotFound(_) => leaf.next().map(|next| (next, 0)),
                    };
                }
            }
        }
    }

    /// Stores `key -> value`, overwriting in place on an equal key.
    /// Returns the previous value when overwriting.
    pub(crate) fn insert(&mut self, key: &[u8], value: &[u8]) -> Option<Vec<u8>> {
        let Some(root) = self.root else {
            let mut leaf = LeafNode::new();
            leaf.push_back(key.to_vec(), value.to_vec());
            self.root = Some(self.nodes.alloc(Node::Leaf(leaf)));
            self.len = 1;
            return None;
        };

        let mut path: Path = SmallVec::new();
        let mut current = root;
        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => {
                    let child_index = internal.child_for(key);
                    path.push(PathElement { node: current, child_index });
                    current = internal.child(child_index);
                }
                Node::Leaf(_) => break,
            }
        }

        let leaf = self.nodes.get_mut(current).as_leaf_mut();
        match leaf.search(key) {
            SearchResult::Found(index) => Some(leaf.set_value(index, value.to_vec())),
            SearchResult::NotFound(index) => {
                leaf.insert(index, key.to_vec(), value.to_vec());
                self.len += 1;
                if leaf.is_overfull(self.order) {
                    self.split_leaf_and_propagate(current, path);
                }
                None
            }
        }
    }

    /// Splits an overfull leaf and walks the promotion up the recorded path.
    fn split_leaf_and_propagate(&mut self, leaf_handle: Handle, path: Path) {
        let order = self.order;
        let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();

        // Left keeps `order` rows, right takes `order + 1`. The separator is
        // a copy of the right node's first key; the key itself stays in the
        // leaf.
        let mut right = leaf.split_off(order);
        let separator = right.first_key().to_vec();
        let successor = leaf.next();
        right.set_prev(Some(leaf_handle));
        right.set_next(successor);

        let right_handle = self.nodes.alloc(Node::Leaf(right));
        self.nodes.get_mut(leaf_handle).as_leaf_mut().set_next(Some(right_handle));
        if let Some(successor) = successor {
            self.nodes.get_mut(successor).as_leaf_mut().set_prev(Some(right_handle));
        }

        self.propagate_split(path, separator, right_handle);
    }

    /// Inserts a promoted separator into each ancestor in turn, splitting
    /// ancestors that overflow. A root split grows the tree by one level.
    fn propagate_split(&mut self, mut path: Path, mut separator: Vec<u8>, mut new_child: Handle) {
        let order = self.order;

        while let Some(element) = path.pop() {
            let parent = self.nodes.get_mut(element.node).as_internal_mut();
            parent.insert_separator(element.child_index, separator, new_child);
            if !parent.is_overfull(order) {
                return;
            }
            // Unlike a leaf split, the separator at the split point moves up
            // and out of the node.
            let (median, right) = parent.split_off(order);
            separator = median;
            new_child = self.nodes.alloc(Node::Internal(right));
        }

        let old_root = self.root.expect("tree is non-empty during a split");
        let new_root = InternalNode::new_root(separator, old_root, new_child);
        self.root = Some(self.nodes.alloc(Node::Internal(new_root)));
    }

    /// Removes `key`, returning its value; `None` when absent.
    pub(crate) fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let root = self.root?;

        let mut path: Path = SmallVec::new();
        let mut current = root;
        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => {
                    let child_index = internal.child_for(key);
                    path.push(PathElement { node: current, child_index });
                    current = internal.child(child_index);
                }
                Node::Leaf(_) => break,
            }
        }

        let leaf = self.nodes.get_mut(current).as_leaf_mut();
        let index = match leaf.search(key) {
            SearchResult::Found(index) => index,
            SearchResult::NotFound(_) => return None,
        };
        let (_, value) = leaf.remove(index);
        self.len -= 1;

        // Last pair gone: drop the root instead of keeping a zero-key leaf.
        if self.len == 0 {
            self.nodes.clear();
            self.root = None;
            return Some(value);
        }

        if self.nodes.get(current).as_leaf().is_underfull(self.order) && !path.is_empty() {
            self.rebalance_leaf(current, path);
        }

        Some(value)
    }

    /// Restores an underflowed leaf: borrow from the left sibling, else from
    /// the right, else merge (into the left if it exists, else with the
    /// right).
    fn rebalance_leaf(&mut self, leaf_handle: Handle, mut path: Path) {
        let order = self.order;
        let element = path.last().expect("underflowed leaf has a parent");
        let parent_handle = element.node;
        let child_index = element.child_index;

        if child_index > 0 {
            let left = self.nodes.get(parent_handle).as_internal().child(child_index - 1);
            if self.nodes.get(left).as_leaf().can_lend(order) {
                self.borrow_from_left_leaf(leaf_handle, left, parent_handle, child_index);
                return;
            }
        }

        let parent = self.nodes.get(parent_handle).as_internal();
        if child_index + 1 < parent.child_count() {
            let right = parent.child(child_index + 1);
            if self.nodes.get(right).as_leaf().can_lend(order) {
                self.borrow_from_right_leaf(leaf_handle, right, parent_handle, child_index);
                return;
            }
        }

        if child_index > 0 {
            let left = self.nodes.get(parent_handle).as_internal().child(child_index - 1);
            self.merge_leaves(left, leaf_handle, &mut path, child_index - 1);
        } else {
            let right = self.nodes.get(parent_handle).as_internal().child(child_index + 1);
            self.merge_leaves(leaf_handle, right, &mut path, child_index);
        }
    }

    /// Moves the left sibling's last pair to the front of the leaf. The
    /// moved key is the leaf's new first key and becomes the separator.
    fn borrow_from_left_leaf(
        &mut self,
        leaf_handle: Handle,
        left_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        let (key, value) = self.nodes.get_mut(left_handle).as_leaf_mut().pop_back();
        let separator = key.clone();
        self.nodes.get_mut(leaf_handle).as_leaf_mut().push_front(key, value);
        self.nodes.get_mut(parent_handle).as_internal_mut().set_key(child_index - 1, separator);
    }

    /// Moves the right sibling's first pair to the back of the leaf and
    /// rewrites the separator to the right sibling's new first key.
    fn borrow_from_right_leaf(
        &mut self,
        leaf_handle: Handle,
        right_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        let right = self.nodes.get_mut(right_handle).as_leaf_mut();
        let (key, value) = right.pop_front();
        let separator = right.first_key().to_vec();
        self.nodes.get_mut(leaf_handle).as_leaf_mut().push_back(key, value);
        self.nodes.get_mut(parent_handle).as_internal_mut().set_key(child_index, separator);
    }

    /// Fuses two adjacent leaves, left surviving. The survivor inherits the
    /// right participant's outgoing chain link; the separator between them
    /// is dropped from the parent (leaves never store separators).
    fn merge_leaves(
        &mut self,
        left_handle: Handle,
        right_handle: Handle,
        path: &mut Path,
        separator_index: usize,
    ) {
        let right = match self.nodes.take(right_handle) {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("leaf merge reached an internal node"),
        };

        let left = self.nodes.get_mut(left_handle).as_leaf_mut();
        left.merge_right(right);
        let successor = left.next();
        if let Some(successor) = successor {
            self.nodes.get_mut(successor).as_leaf_mut().set_prev(Some(left_handle));
        }

        self.remove_separator_and_propagate(path, separator_index);
    }

    /// Drops a merged-away child's separator from the parent, repairs the
    /// remaining separators when the parent's children are leaves, collapses
    /// an emptied root, and cascades the underflow check upward.
    fn remove_separator_and_propagate(&mut self, path: &mut Path, separator_index: usize) {
        let element = path.pop().expect("merge happens below a parent");
        let parent_handle = element.node;

        // The orphan node itself was already taken from the arena by the
        // merge; only its edge needs dropping here.
        let _ = self.nodes.get_mut(parent_handle).as_internal_mut().remove_separator(separator_index);

        // A merge can shift which leaves flank which separator, so every
        // remaining separator over leaf children is rewritten to the first
        // key of the child to its right. Separators over internal children
        // stay structurally correct.
        let parent = self.nodes.get(parent_handle).as_internal();
        if self.nodes.get(parent.child(0)).is_leaf() {
            let repairs: Vec<Vec<u8>> = (0..parent.key_count())
                .map(|index| {
                    self.nodes.get(parent.child(index + 1)).as_leaf().first_key().to_vec()
                })
                .collect();
            let parent = self.nodes.get_mut(parent_handle).as_internal_mut();
            for (index, key) in repairs.into_iter().enumerate() {
                parent.set_key(index, key);
            }
        }

        let parent = self.nodes.get(parent_handle).as_internal();
        if path.is_empty() {
            // The parent is the root. An internal root left with zero keys
            // collapses to its sole child, shrinking the tree by one level.
            if parent.key_count() == 0 {
                let new_root = parent.child(0);
                self.nodes.free(parent_handle);
                self.root = Some(new_root);
            }
            return;
        }

        if parent.is_underfull(self.order) {
            self.rebalance_internal(parent_handle, path);
        }
    }

    /// Restores an underflowed internal node; same preference order as
    /// leaves, with the separator rotating through the parent instead of
    /// being rewritten.
    fn rebalance_internal(&mut self, node_handle: Handle, path: &mut Path) {
        let order = self.order;
        let element = path.last().expect("underflowed node has a parent");
        let parent_handle = element.node;
        let child_index = element.child_index;

        if child_index > 0 {
            let left = self.nodes.get(parent_handle).as_internal().child(child_index - 1);
            if self.nodes.get(left).as_internal().can_lend(order) {
                self.borrow_from_left_internal(node_handle, left, parent_handle, child_index);
                return;
            }
        }

        let parent = self.nodes.get(parent_handle).as_internal();
        if child_index + 1 < parent.child_count() {
            let right = parent.child(child_index + 1);
            if self.nodes.get(right).as_internal().can_lend(order) {
                self.borrow_from_right_internal(node_handle, right, parent_handle, child_index);
                return;
            }
        }

        if child_index > 0 {
            let left = self.nodes.get(parent_handle).as_internal().child(child_index - 1);
            self.merge_internals(left, node_handle, path, child_index - 1);
        } else {
            let right = self.nodes.get(parent_handle).as_internal().child(child_index + 1);
            self.merge_internals(node_handle, right, path, child_index);
        }
    }

    /// Rotation through the parent: the separator comes down in front of
    /// the node's keys along with the lender's last child; the lender's
    /// last key goes up to replace the separator.
    fn borrow_from_left_internal(
        &mut self,
        node_handle: Handle,
        left_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        let separator =
            self.nodes.get(parent_handle).as_internal().key(child_index - 1).to_vec();
        let (promoted, child) = self.nodes.get_mut(left_handle).as_internal_mut().pop_back();
        self.nodes.get_mut(node_handle).as_internal_mut().push_front(separator, child);
        self.nodes.get_mut(parent_handle).as_internal_mut().set_key(child_index - 1, promoted);
    }

    /// Mirror rotation: the separator comes down at the back of the node's
    /// keys with the lender's first child; the lender's first key goes up.
    fn borrow_from_right_internal(
        &mut self,
        node_handle: Handle,
        right_handle: Handle,
        parent_handle: Handle,
        child_index: usize,
    ) {
        let separator = self.nodes.get(parent_handle).as_internal().key(child_index).to_vec();
        let (promoted, child) = self.nodes.get_mut(right_handle).as_internal_mut().pop_front();
        self.nodes.get_mut(node_handle).as_internal_mut().push_back(separator, child);
        self.nodes.get_mut(parent_handle).as_internal_mut().set_key(child_index, promoted);
    }

    /// Fuses two adjacent internal nodes, left surviving, pulling the parent
    /// separator down between the two key runs.
    fn merge_internals(
        &mut self,
        left_handle: Handle,
        right_handle: Handle,
        path: &mut Path,
        separator_index: usize,
    ) {
        let parent_handle = path.last().expect("merge happens below a parent").node;
        let separator =
            self.nodes.get(parent_handle).as_internal().key(separator_index).to_vec();

        let right = match self.nodes.take(right_handle) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("internal merge reached a leaf"),
        };
        self.nodes.get_mut(left_handle).as_internal_mut().merge_right(separator, right);

        self.remove_separator_and_propagate(path, separator_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    impl RawTree {
        /// Walks the whole structure and asserts every reachable-state
        /// invariant: fan-out bounds, child counts, strict key order,
        /// separator partitioning, uniform leaf depth, the leaf chain in
        /// both directions, per-leaf row widths, `len`, and that the arena
        /// holds exactly the reachable nodes.
        pub(crate) fn validate_invariants(&self) {
            let Some(root) = self.root else {
                assert_eq!(self.len, 0, "empty tree must have len 0");
                assert!(self.nodes.is_empty(), "empty tree must not retain nodes");
                return;
            };

            let mut leaves = Vec::new();
            let mut leaf_depth = None;
            let mut node_count = 0usize;
            self.validate_node(root, 0, true, &mut leaf_depth, &mut leaves, &mut node_count);

            assert_eq!(self.nodes.len(), node_count, "arena retains unreachable nodes");

            let total: usize =
                leaves.iter().map(|&handle| self.nodes.get(handle).as_leaf().key_count()).sum();
            assert_eq!(self.len, total, "len out of sync with leaf contents");

            self.validate_leaf_chain(&leaves);
        }

        /// Returns the (min, max) key of the subtree.
        fn validate_node(
            &self,
            handle: Handle,
            depth: usize,
            is_root: bool,
            leaf_depth: &mut Option<usize>,
            leaves: &mut Vec<Handle>,
            node_count: &mut usize,
        ) -> (Vec<u8>, Vec<u8>) {
            *node_count += 1;
            let order = self.order;

            match self.nodes.get(handle) {
                Node::Leaf(leaf) => {
                    match *leaf_depth {
                        None => *leaf_depth = Some(depth),
                        Some(expected) => {
                            assert_eq!(depth, expected, "leaves at unequal depth");
                        }
                    }

                    let count = leaf.key_count();
                    assert_eq!(count, leaf.value_count(), "leaf key/value rows diverge");
                    assert!(count >= 1, "reachable leaf is empty");
                    if is_root {
                        assert!(count <= 2 * order, "root leaf over capacity");
                    } else {
                        // A split leaves its left half with exactly `order`
                        // keys, so that is the reachable minimum.
                        assert!(count >= order, "non-root leaf below minimum");
                        assert!(count <= 2 * order, "leaf over capacity");
                    }

                    for index in 1..count {
                        assert!(
                            leaf.key(index - 1) < leaf.key(index),
                            "leaf keys out of order"
                        );
                    }

                    leaves.push(handle);
                    (leaf.key(0).to_vec(), leaf.key(count - 1).to_vec())
                }
                Node::Internal(internal) => {
                    let count = internal.key_count();
                    assert_eq!(
                        internal.child_count(),
                        count + 1,
                        "internal child count must be keys + 1"
                    );
                    if is_root {
                        assert!(count >= 1, "internal root left with no separators");
                    } else {
                        assert!(count >= order, "non-root internal below minimum");
                    }
                    // Two minimum siblings merging pull a separator down on
                    // top of `2 * order` keys; the next promotion through
                    // the node splits it back down. A root collapse can
                    // promote such a node, so the root shares the bound.
                    assert!(count <= 2 * order + 1, "internal over capacity");

                    for index in 1..count {
                        assert!(
                            internal.key(index - 1) < internal.key(index),
                            "separators out of order"
                        );
                    }

                    let mut bounds = Vec::with_capacity(count + 1);
                    for index in 0..=count {
                        bounds.push(self.validate_node(
                            internal.child(index),
                            depth + 1,
                            false,
                            leaf_depth,
                            leaves,
                            node_count,
                        ));
                    }

                    // Separators partition the key space: everything left of
                    // a separator is strictly smaller, everything right is
                    // at least the separator. (A plain deletion of a leaf's
                    // first key may leave the separator strictly below the
                    // subtree minimum, which still routes correctly.)
                    for index in 0..count {
                        let separator = internal.key(index);
                        assert!(
                            bounds[index].1.as_slice() < separator,
                            "left subtree reaches its separator"
                        );
                        assert!(
                            separator <= bounds[index + 1].0.as_slice(),
                            "right subtree starts below its separator"
                        );
                    }

                    (bounds[0].0.clone(), bounds[count].1.clone())
                }
            }
        }

        fn validate_leaf_chain(&self, leaves: &[Handle]) {
            for (index, &handle) in leaves.iter().enumerate() {
                let leaf = self.nodes.get(handle).as_leaf();
                let expected_prev = if index > 0 { Some(leaves[index - 1]) } else { None };
                let expected_next =
                    if index + 1 < leaves.len() { Some(leaves[index + 1]) } else { None };
                assert_eq!(leaf.prev(), expected_prev, "leaf chain prev link broken");
                assert_eq!(leaf.next(), expected_next, "leaf chain next link broken");
            }
        }
    }

    fn key(value: u32) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    #[test]
    fn ascending_inserts_split_and_stay_ordered() {
        let mut tree = RawTree::new(3);
        for value in 0..50 {
            tree.insert(&key(value), &key(value * 10));
            tree.validate_invariants();
        }
        assert_eq!(tree.len(), 50);
        assert!(tree.height() >= 2);
        for value in 0..50 {
            assert_eq!(tree.get(&key(value)), Some(key(value * 10).as_slice()));
        }
        assert_eq!(tree.get(&key(50)), None);
    }

    #[test]
    fn update_in_place_keeps_shape() {
        let mut tree = RawTree::new(3);
        for value in 0..20 {
            tree.insert(&key(value), b"first");
        }
        let height = tree.height();
        let len = tree.len();

        let old = tree.insert(&key(7), b"second");
        assert_eq!(old.as_deref(), Some(&b"first"[..]));
        assert_eq!(tree.height(), height);
        assert_eq!(tree.len(), len);
        assert_eq!(tree.get(&key(7)), Some(&b"second"[..]));
        tree.validate_invariants();
    }

    #[test]
    fn leaf_borrow_from_right_rewrites_separator() {
        // Seven ascending keys at order 3 split into [0,1,2] | [3,4,5,6]
        // with separator 3. Deleting 0 underflows the left leaf; it borrows
        // 3 from the right sibling and the separator becomes 4.
        let mut tree = RawTree::new(3);
        for value in 0..7 {
            tree.insert(&key(value), &key(value));
        }
        let root = tree.nodes.get(tree.root.unwrap()).as_internal();
        assert_eq!(root.key(0), key(3).as_slice());

        assert!(tree.remove(&key(0)).is_some());
        tree.validate_invariants();

        let root = tree.nodes.get(tree.root.unwrap()).as_internal();
        assert_eq!(root.key_count(), 1);
        assert_eq!(root.key(0), key(4).as_slice());
        let left = tree.nodes.get(root.child(0)).as_leaf();
        let right = tree.nodes.get(root.child(1)).as_leaf();
        assert_eq!(left.key_count(), 3);
        assert_eq!(right.key_count(), 3);
        assert_eq!(right.first_key(), key(4).as_slice());
    }

    #[test]
    fn leaf_merge_collapses_root() {
        let mut tree = RawTree::new(3);
        for value in 0..8 {
            tree.insert(&key(value), &key(value));
        }
        assert_eq!(tree.height(), 2);

        // Drain until the two leaves merge back into a lone root leaf.
        let mut remaining: Vec<u32> = (0..8).collect();
        while tree.height() > 1 {
            let value = remaining.pop().unwrap();
            assert!(tree.remove(&key(value)).is_some());
            tree.validate_invariants();
        }
        for value in remaining {
            assert_eq!(tree.get(&key(value)), Some(key(value).as_slice()));
        }
    }

    #[test]
    fn removing_last_pair_returns_to_no_root_state() {
        let mut tree = RawTree::new(2);
        tree.insert(b"only", b"pair");
        assert_eq!(tree.remove(b"only").as_deref(), Some(&b"pair"[..]));
        assert!(tree.root.is_none());
        assert_eq!(tree.len(), 0);
        tree.validate_invariants();

        // The tree is reusable after disposal.
        tree.insert(b"again", b"fresh");
        assert_eq!(tree.get(b"again"), Some(&b"fresh"[..]));
        tree.validate_invariants();
    }

    #[test]
    fn empty_key_is_an_ordinary_smallest_key() {
        let mut tree = RawTree::new(2);
        tree.insert(b"", b"empty");
        tree.insert(b"a", b"letter");
        assert_eq!(tree.get(b""), Some(&b"empty"[..]));
        assert_eq!(tree.leftmost_leaf().map(|h| tree.nodes.get(h).as_leaf().key(0).to_vec()), Some(Vec::new()));
        assert_eq!(tree.remove(b"").as_deref(), Some(&b"empty"[..]));
        assert_eq!(tree.get(b""), None);
        tree.validate_invariants();
    }

    #[test]
    fn lower_bound_hops_to_the_next_leaf() {
        let mut tree = RawTree::new(3);
        for value in (0..20).map(|v| v * 2) {
            tree.insert(&key(value), &key(value));
        }
        // Probe between the largest key of one leaf and the smallest of the
        // next; the landing position must hop leaves, not fall off the end.
        for probe in 0..38 {
            let (leaf, index) = tree.lower_bound(&key(probe)).expect("a key >= probe exists");
            let landed = tree.nodes.get(leaf).as_leaf().key(index).to_vec();
            let expected = key(probe.div_ceil(2) * 2);
            assert_eq!(landed, expected, "lower_bound({probe})");
        }
        assert!(tree.lower_bound(&key(39)).is_none());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(u32),
        Remove(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u32..400).prop_map(Op::Insert),
            2 => (0u32..400).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// Every structural invariant holds after every operation, across
        /// the interesting small orders (order 1 exercises the rebalancing
        /// paths hardest).
        #[test]
        fn invariants_survive_random_operations(
            order in 1usize..=4,
            ops in prop::collection::vec(op_strategy(), 0..400),
        ) {
            let mut tree = RawTree::new(order);
            let mut model = std::collections::BTreeMap::new();

            for op in ops {
                match op {
                    Op::Insert(value) => {
                        let previous = tree.insert(&key(value), &key(value * 2));
                        let expected = model.insert(value, value * 2);
                        prop_assert_eq!(previous.is_some(), expected.is_some());
                    }
                    Op::Remove(value) => {
                        let removed = tree.remove(&key(value));
                        let expected = model.remove(&value);
                        prop_assert_eq!(removed.is_some(), expected.is_some());
                    }
                }
                tree.validate_invariants();
                prop_assert_eq!(tree.len(), model.len());
            }

            for (k, v) in &model {
                let expected = key(*v);
                prop_assert_eq!(tree.get(&key(*k)), Some(expected.as_slice()));
            }
        }
    }
}
