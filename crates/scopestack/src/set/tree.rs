//! Ordered ownership set
//!
//! A height-balanced (AVL) binary search tree keyed by address value. Nodes
//! live in a `Vec` and refer to each other by index; removed nodes are
//! threaded onto an intrusive free list and reused by later inserts, so
//! removal never allocates and insertion allocates only when the free list is
//! empty.
//!
//! Deleting a node with two children replaces it with its in-order successor
//! (the left-most node of its right subtree); the successor's own right
//! subtree takes its old place. Rotations after every insert and remove keep
//! the height logarithmic even for monotonically ordered addresses, which is
//! what a bump-like heap hands out most of the time.

use core::cmp::Ordering;

use super::{Address, OwnershipSet};
use crate::error::{ScopeError, ScopeResult};

type NodeId = usize;

#[derive(Debug, Clone, Copy)]
struct Node {
    addr: Address,
    left: Option<NodeId>,
    right: Option<NodeId>,
    height: i32,
}

/// Balanced tree of owned addresses
#[derive(Debug, Default)]
pub struct TreeSet {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    /// Head of the free list; freed nodes link through `left`
    free_head: Option<NodeId>,
    len: usize,
    node_limit: Option<usize>,
}

impl TreeSet {
    /// Creates an empty, unbounded tree
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tree that refuses to hold more than `limit` nodes
    #[must_use]
    pub fn with_node_limit(limit: usize) -> Self {
        Self {
            node_limit: Some(limit),
            ..Self::default()
        }
    }

    /// Configured bookkeeping limit, if any
    #[must_use]
    pub fn node_limit(&self) -> Option<usize> {
        self.node_limit
    }

    /// Height of the tree (0 when empty)
    #[must_use]
    pub fn height(&self) -> usize {
        self.height_of(self.root) as usize
    }

    /// In-order iterator over owned addresses
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.push_left(self.root);
        iter
    }

    // ------------------------------------------------------------------------
    // Node storage
    // ------------------------------------------------------------------------

    fn alloc_node(&mut self, addr: Address) -> ScopeResult<NodeId> {
        if let Some(limit) = self.node_limit
            && self.len >= limit
        {
            return Err(ScopeError::node_exhausted(Some(limit)));
        }

        let node = Node {
            addr,
            left: None,
            right: None,
            height: 1,
        };

        if let Some(id) = self.free_head {
            self.free_head = self.nodes[id].left;
            self.nodes[id] = node;
            return Ok(id);
        }

        self.nodes
            .try_reserve(1)
            .map_err(|_| ScopeError::node_exhausted(self.node_limit))?;
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    fn free_node(&mut self, id: NodeId) {
        let node = &mut self.nodes[id];
        node.left = self.free_head;
        node.right = None;
        node.height = 0;
        self.free_head = Some(id);
    }

    // ------------------------------------------------------------------------
    // Balancing
    // ------------------------------------------------------------------------

    fn height_of(&self, id: Option<NodeId>) -> i32 {
        id.map_or(0, |id| self.nodes[id].height)
    }

    fn update_height(&mut self, id: NodeId) {
        let node = self.nodes[id];
        self.nodes[id].height = 1 + self.height_of(node.left).max(self.height_of(node.right));
    }

    fn balance_factor(&self, id: NodeId) -> i32 {
        let node = &self.nodes[id];
        self.height_of(node.left) - self.height_of(node.right)
    }

    fn rotate_right(&mut self, y: NodeId) -> NodeId {
        let Some(x) = self.nodes[y].left else {
            return y;
        };
        self.nodes[y].left = self.nodes[x].right;
        self.nodes[x].right = Some(y);
        self.update_height(y);
        self.update_height(x);
        x
    }

    fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let Some(y) = self.nodes[x].right else {
            return x;
        };
        self.nodes[x].right = self.nodes[y].left;
        self.nodes[y].left = Some(x);
        self.update_height(x);
        self.update_height(y);
        y
    }

    /// Restores the AVL property at `id`, returning the new subtree root
    fn rebalance(&mut self, id: NodeId) -> NodeId {
        self.update_height(id);
        let balance = self.balance_factor(id);

        if balance > 1 {
            if let Some(left) = self.nodes[id].left
                && self.balance_factor(left) < 0
            {
                self.nodes[id].left = Some(self.rotate_left(left));
            }
            return self.rotate_right(id);
        }

        if balance < -1 {
            if let Some(right) = self.nodes[id].right
                && self.balance_factor(right) > 0
            {
                self.nodes[id].right = Some(self.rotate_right(right));
            }
            return self.rotate_left(id);
        }

        id
    }

    // ------------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------------

    fn attach(&mut self, root: Option<NodeId>, new: NodeId) -> NodeId {
        let Some(id) = root else {
            return new;
        };

        if self.nodes[new].addr < self.nodes[id].addr {
            let left = self.attach(self.nodes[id].left, new);
            self.nodes[id].left = Some(left);
        } else {
            let right = self.attach(self.nodes[id].right, new);
            self.nodes[id].right = Some(right);
        }

        self.rebalance(id)
    }

    fn detach(&mut self, root: Option<NodeId>, addr: Address, removed: &mut bool) -> Option<NodeId> {
        let id = root?;

        match addr.cmp(&self.nodes[id].addr) {
            Ordering::Less => {
                let left = self.detach(self.nodes[id].left, addr, removed);
                self.nodes[id].left = left;
            }
            Ordering::Greater => {
                let right = self.detach(self.nodes[id].right, addr, removed);
                self.nodes[id].right = right;
            }
            Ordering::Equal => {
                *removed = true;
                let Node { left, right, .. } = self.nodes[id];

                let replacement = match (left, right) {
                    (None, None) => None,
                    (Some(child), None) | (None, Some(child)) => Some(child),
                    (Some(_), Some(right)) => {
                        let (rest, successor) = self.take_min(right);
                        self.nodes[successor].left = left;
                        self.nodes[successor].right = rest;
                        Some(self.rebalance(successor))
                    }
                };

                self.free_node(id);
                return replacement;
            }
        }

        Some(self.rebalance(id))
    }

    /// Unlinks the left-most node under `id`
    ///
    /// Returns the remaining subtree and the unlinked node.
    fn take_min(&mut self, id: NodeId) -> (Option<NodeId>, NodeId) {
        match self.nodes[id].left {
            None => (self.nodes[id].right, id),
            Some(left) => {
                let (rest, min) = self.take_min(left);
                self.nodes[id].left = rest;
                (Some(self.rebalance(id)), min)
            }
        }
    }

    fn release_post_order(&self, id: Option<NodeId>, release: &mut dyn FnMut(Address)) {
        let Some(id) = id else {
            return;
        };
        let node = self.nodes[id];
        self.release_post_order(node.left, release);
        self.release_post_order(node.right, release);
        release(node.addr);
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        fn walk(tree: &TreeSet, id: Option<NodeId>, lo: Option<Address>, hi: Option<Address>) -> (i32, usize) {
            let Some(id) = id else {
                return (0, 0);
            };
            let node = tree.nodes[id];
            assert!(lo.is_none_or(|lo| lo < node.addr), "order violated at {}", node.addr);
            assert!(hi.is_none_or(|hi| node.addr < hi), "order violated at {}", node.addr);
            let (lh, lc) = walk(tree, node.left, lo, Some(node.addr));
            let (rh, rc) = walk(tree, node.right, Some(node.addr), hi);
            assert!((lh - rh).abs() <= 1, "unbalanced at {}", node.addr);
            assert_eq!(node.height, 1 + lh.max(rh), "stale height at {}", node.addr);
            (node.height, lc + rc + 1)
        }

        let (_, count) = walk(self, self.root, None, None);
        assert_eq!(count, self.len);
    }
}

impl OwnershipSet for TreeSet {
    fn insert(&mut self, addr: Address) -> ScopeResult<()> {
        if self.contains(addr) {
            return Err(ScopeError::already_tracked(addr));
        }

        let id = self.alloc_node(addr)?;
        self.root = Some(self.attach(self.root, id));
        self.len += 1;
        Ok(())
    }

    fn remove(&mut self, addr: Address) -> bool {
        let mut removed = false;
        self.root = self.detach(self.root, addr, &mut removed);
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn contains(&self, addr: Address) -> bool {
        let mut cursor = self.root;
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            cursor = match addr.cmp(&node.addr) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return true,
            };
        }
        false
    }

    fn len(&self) -> usize {
        self.len
    }

    fn destroy_all(&mut self, release: &mut dyn FnMut(Address)) {
        self.release_post_order(self.root, release);
        self.nodes = Vec::new();
        self.root = None;
        self.free_head = None;
        self.len = 0;
    }

    fn addresses(&self) -> Vec<Address> {
        self.iter().collect()
    }
}

/// In-order iterator over a [`TreeSet`]
pub struct Iter<'a> {
    tree: &'a TreeSet,
    stack: Vec<NodeId>,
}

impl Iter<'_> {
    fn push_left(&mut self, mut cursor: Option<NodeId>) {
        while let Some(id) = cursor {
            self.stack.push(id);
            cursor = self.tree.nodes[id].left;
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id];
        self.push_left(node.right);
        Some(node.addr)
    }
}

impl<'a> IntoIterator for &'a TreeSet {
    type Item = Address;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}
