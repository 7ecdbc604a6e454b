//! Adaptive radix tree index
//!
//! Inner nodes hold a compressed path prefix, an optional leaf for the key
//! ending exactly at that node, and children keyed by the next byte. Child
//! tables grow and shrink between 4, 16, 48 and 256 slots.
//!
//! ```text
//!            [prefix "us"]
//!            /     |      \
//!         'e'     'k'     (terminal "us")
//!     [prefix "r"] leaf "usk"
//!      ...
//! ```

use crate::record::RecordPos;

use super::{IndexIterator, Indexer, SnapshotIterator};

/// Radix tree mapping full keys to record locations
#[derive(Default)]
pub struct ArtIndex {
    root: Option<Node>,
    len: usize,
}

impl ArtIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for ArtIndex {
    fn put(&mut self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos> {
        let old = match self.root.as_mut() {
            Some(root) => insert(root, key, pos, 0),
            None => {
                self.root = Some(Node::Leaf(Leaf { key, pos }));
                None
            }
        };
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    fn get(&self, key: &[u8]) -> Option<RecordPos> {
        self.root.as_ref().and_then(|root| lookup(root, key))
    }

    fn delete(&mut self, key: &[u8]) -> Option<RecordPos> {
        let root = self.root.as_mut()?;
        let (removed, emptied) = remove(root, key, 0);
        if emptied {
            self.root = None;
        }
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn len(&self) -> usize {
        self.len
    }

    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator> {
        let mut entries = Vec::with_capacity(self.len);
        if let Some(root) = &self.root {
            collect(root, &mut entries);
        }
        Box::new(SnapshotIterator::new(entries, reverse))
    }
}

// =============================================================================
// Nodes
// =============================================================================

enum Node {
    Leaf(Leaf),
    Inner(Box<Inner>),
}

struct Leaf {
    key: Vec<u8>,
    pos: RecordPos,
}

impl Leaf {
    /// Stand-in while a node is being rebuilt in place
    fn empty() -> Self {
        Self {
            key: Vec::new(),
            pos: RecordPos {
                segment_id: 0,
                offset: 0,
                size: 0,
            },
        }
    }
}

struct Inner {
    /// Bytes shared by every key below this node
    prefix: Vec<u8>,

    /// Key that ends exactly after `prefix`
    terminal: Option<Leaf>,

    children: Children,
}

impl Inner {
    fn new(prefix: Vec<u8>) -> Self {
        Self {
            prefix,
            terminal: None,
            children: Children::node4(),
        }
    }

    /// Hang `leaf` below this node; `depth` is where this node's prefix ends
    fn attach(&mut self, leaf: Leaf, depth: usize) {
        if leaf.key.len() == depth {
            self.terminal = Some(leaf);
        } else {
            let byte = leaf.key[depth];
            self.children.add(byte, Node::Leaf(leaf));
        }
    }
}

fn common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn take(node: &mut Node) -> Node {
    std::mem::replace(node, Node::Leaf(Leaf::empty()))
}

// =============================================================================
// Operations
// =============================================================================

/// Insert below `node`, whose keys all share `key[..depth]`
fn insert(node: &mut Node, key: Vec<u8>, pos: RecordPos, depth: usize) -> Option<RecordPos> {
    match node {
        Node::Leaf(leaf) if leaf.key == key => Some(std::mem::replace(&mut leaf.pos, pos)),
        Node::Leaf(existing) => {
            let existing = std::mem::replace(existing, Leaf::empty());
            let shared = common_prefix(&existing.key[depth..], &key[depth..]);

            let mut inner = Inner::new(key[depth..depth + shared].to_vec());
            inner.attach(existing, depth + shared);
            inner.attach(Leaf { key, pos }, depth + shared);
            *node = Node::Inner(Box::new(inner));
            None
        }
        Node::Inner(inner) => {
            let shared = common_prefix(&inner.prefix, &key[depth..]);

            if shared < inner.prefix.len() {
                // Split the compressed path where the new key diverges
                let byte = inner.prefix[shared];
                let head = inner.prefix[..shared].to_vec();
                inner.prefix.drain(..=shared);

                let old = take(node);
                let mut split = Inner::new(head);
                split.children.add(byte, old);
                split.attach(Leaf { key, pos }, depth + shared);
                *node = Node::Inner(Box::new(split));
                return None;
            }

            let depth = depth + inner.prefix.len();
            if key.len() == depth {
                if let Some(leaf) = inner.terminal.as_mut() {
                    return Some(std::mem::replace(&mut leaf.pos, pos));
                }
                inner.terminal = Some(Leaf { key, pos });
                return None;
            }

            let byte = key[depth];
            if let Some(child) = inner.children.find_mut(byte) {
                return insert(child, key, pos, depth + 1);
            }
            inner.children.add(byte, Node::Leaf(Leaf { key, pos }));
            None
        }
    }
}

fn lookup(mut node: &Node, key: &[u8]) -> Option<RecordPos> {
    let mut depth = 0;
    loop {
        match node {
            Node::Leaf(leaf) => return (leaf.key == key).then_some(leaf.pos),
            Node::Inner(inner) => {
                if !key[depth..].starts_with(&inner.prefix) {
                    return None;
                }
                depth += inner.prefix.len();
                if depth == key.len() {
                    return inner.terminal.as_ref().map(|leaf| leaf.pos);
                }
                node = inner.children.find(key[depth])?;
                depth += 1;
            }
        }
    }
}

/// Remove `key` below `node`.
///
/// Returns the removed location and whether `node` itself is now empty.
fn remove(node: &mut Node, key: &[u8], depth: usize) -> (Option<RecordPos>, bool) {
    let inner = match node {
        Node::Leaf(leaf) => {
            return if leaf.key == key {
                (Some(leaf.pos), true)
            } else {
                (None, false)
            };
        }
        Node::Inner(inner) => inner,
    };

    if !key[depth..].starts_with(&inner.prefix) {
        return (None, false);
    }
    let depth = depth + inner.prefix.len();

    let removed = if key.len() == depth {
        inner.terminal.take().map(|leaf| leaf.pos)
    } else {
        let byte = key[depth];
        let (removed, emptied) = match inner.children.find_mut(byte) {
            Some(child) => remove(child, key, depth + 1),
            None => return (None, false),
        };
        if emptied {
            inner.children.remove(byte);
        }
        removed
    };

    if removed.is_none() {
        return (None, false);
    }
    (removed, collapse(node))
}

/// Fold an inner node that no longer needs to branch.
/// Returns true if nothing is left.
fn collapse(node: &mut Node) -> bool {
    let inner = match node {
        Node::Inner(inner) => inner,
        Node::Leaf(_) => return false,
    };

    match (inner.terminal.is_some(), inner.children.len()) {
        (false, 0) => true,
        (true, 0) => {
            if let Some(leaf) = inner.terminal.take() {
                *node = Node::Leaf(leaf);
            }
            false
        }
        (false, 1) => {
            if let Some((byte, child)) = inner.children.take_only() {
                let mut prefix = std::mem::take(&mut inner.prefix);
                *node = match child {
                    Node::Leaf(leaf) => Node::Leaf(leaf),
                    Node::Inner(mut child) => {
                        prefix.push(byte);
                        prefix.extend_from_slice(&child.prefix);
                        child.prefix = prefix;
                        Node::Inner(child)
                    }
                };
            }
            false
        }
        _ => false,
    }
}

/// Append every entry below `node` in ascending key order
fn collect(node: &Node, out: &mut Vec<(Vec<u8>, RecordPos)>) {
    match node {
        Node::Leaf(leaf) => out.push((leaf.key.clone(), leaf.pos)),
        Node::Inner(inner) => {
            if let Some(leaf) = &inner.terminal {
                out.push((leaf.key.clone(), leaf.pos));
            }
            for (_, child) in inner.children.entries() {
                collect(child, out);
            }
        }
    }
}

// =============================================================================
// Child Tables
// =============================================================================

enum Children {
    /// Up to 4 children, bytes kept sorted
    Node4 { keys: Vec<u8>, nodes: Vec<Node> },

    /// Up to 16 children, bytes kept sorted
    Node16 { keys: Vec<u8>, nodes: Vec<Node> },

    /// Up to 48 children; `index[byte]` is slot + 1, 0 when empty
    Node48 { index: Box<[u8; 256]>, nodes: Vec<Node> },

    /// Direct table
    Node256 { nodes: Vec<Option<Node>>, count: usize },
}

impl Children {
    fn node4() -> Self {
        Children::Node4 {
            keys: Vec::with_capacity(4),
            nodes: Vec::with_capacity(4),
        }
    }

    fn node16() -> Self {
        Children::Node16 {
            keys: Vec::with_capacity(16),
            nodes: Vec::with_capacity(16),
        }
    }

    fn node48() -> Self {
        Children::Node48 {
            index: Box::new([0; 256]),
            nodes: Vec::with_capacity(48),
        }
    }

    fn node256() -> Self {
        Children::Node256 {
            nodes: (0..256).map(|_| None).collect(),
            count: 0,
        }
    }

    fn len(&self) -> usize {
        match self {
            Children::Node4 { keys, .. } | Children::Node16 { keys, .. } => keys.len(),
            Children::Node48 { nodes, .. } => nodes.len(),
            Children::Node256 { count, .. } => *count,
        }
    }

    fn find(&self, byte: u8) -> Option<&Node> {
        match self {
            Children::Node4 { keys, nodes } | Children::Node16 { keys, nodes } => {
                let i = keys.iter().position(|&k| k == byte)?;
                nodes.get(i)
            }
            Children::Node48 { index, nodes } => match index[byte as usize] {
                0 => None,
                slot => nodes.get(slot as usize - 1),
            },
            Children::Node256 { nodes, .. } => nodes[byte as usize].as_ref(),
        }
    }

    fn find_mut(&mut self, byte: u8) -> Option<&mut Node> {
        match self {
            Children::Node4 { keys, nodes } | Children::Node16 { keys, nodes } => {
                let i = keys.iter().position(|&k| k == byte)?;
                nodes.get_mut(i)
            }
            Children::Node48 { index, nodes } => match index[byte as usize] {
                0 => None,
                slot => nodes.get_mut(slot as usize - 1),
            },
            Children::Node256 { nodes, .. } => nodes[byte as usize].as_mut(),
        }
    }

    /// Add a child for a byte that has none
    fn add(&mut self, byte: u8, child: Node) {
        let full = match self {
            Children::Node4 { keys, .. } => keys.len() == 4,
            Children::Node16 { keys, .. } => keys.len() == 16,
            Children::Node48 { nodes, .. } => nodes.len() == 48,
            Children::Node256 { .. } => false,
        };
        if full {
            let larger = match self {
                Children::Node4 { .. } => Children::node16(),
                Children::Node16 { .. } => Children::node48(),
                _ => Children::node256(),
            };
            self.rebuild(larger);
        }
        self.push(byte, child);
    }

    fn push(&mut self, byte: u8, child: Node) {
        match self {
            Children::Node4 { keys, nodes } | Children::Node16 { keys, nodes } => {
                let i = keys.partition_point(|&k| k < byte);
                keys.insert(i, byte);
                nodes.insert(i, child);
            }
            Children::Node48 { index, nodes } => {
                nodes.push(child);
                index[byte as usize] = nodes.len() as u8;
            }
            Children::Node256 { nodes, count } => {
                nodes[byte as usize] = Some(child);
                *count += 1;
            }
        }
    }

    fn remove(&mut self, byte: u8) -> Option<Node> {
        let removed = match self {
            Children::Node4 { keys, nodes } | Children::Node16 { keys, nodes } => {
                let i = keys.iter().position(|&k| k == byte)?;
                keys.remove(i);
                nodes.remove(i)
            }
            Children::Node48 { index, nodes } => {
                let slot = index[byte as usize];
                if slot == 0 {
                    return None;
                }
                index[byte as usize] = 0;

                // swap_remove moves the last node into the freed slot
                let last = nodes.len();
                let node = nodes.swap_remove(slot as usize - 1);
                if slot as usize != last {
                    if let Some(moved) = index.iter_mut().find(|s| **s as usize == last) {
                        *moved = slot;
                    }
                }
                node
            }
            Children::Node256 { nodes, count } => {
                let node = nodes[byte as usize].take()?;
                *count -= 1;
                node
            }
        };

        let smaller = match self {
            Children::Node16 { keys, .. } if keys.len() <= 3 => Some(Children::node4()),
            Children::Node48 { nodes, .. } if nodes.len() <= 12 => Some(Children::node16()),
            Children::Node256 { count, .. } if *count <= 37 => Some(Children::node48()),
            _ => None,
        };
        if let Some(smaller) = smaller {
            self.rebuild(smaller);
        }

        Some(removed)
    }

    /// Remove and return the only child
    fn take_only(&mut self) -> Option<(u8, Node)> {
        if self.len() != 1 {
            return None;
        }
        self.drain().pop()
    }

    /// Children in ascending byte order
    fn entries(&self) -> Vec<(u8, &Node)> {
        match self {
            Children::Node4 { keys, nodes } | Children::Node16 { keys, nodes } => {
                keys.iter().copied().zip(nodes.iter()).collect()
            }
            Children::Node48 { index, nodes } => index
                .iter()
                .enumerate()
                .filter(|&(_, &slot)| slot != 0)
                .map(|(byte, &slot)| (byte as u8, &nodes[slot as usize - 1]))
                .collect(),
            Children::Node256 { nodes, .. } => nodes
                .iter()
                .enumerate()
                .filter_map(|(byte, node)| node.as_ref().map(|node| (byte as u8, node)))
                .collect(),
        }
    }

    /// Move every child out, in ascending byte order
    fn drain(&mut self) -> Vec<(u8, Node)> {
        match self {
            Children::Node4 { keys, nodes } | Children::Node16 { keys, nodes } => {
                keys.drain(..).zip(nodes.drain(..)).collect()
            }
            Children::Node48 { index, nodes } => {
                let mut slots: Vec<Option<Node>> = nodes.drain(..).map(Some).collect();
                let mut out = Vec::with_capacity(slots.len());
                for (byte, slot) in index.iter_mut().enumerate() {
                    if *slot != 0 {
                        if let Some(node) = slots[*slot as usize - 1].take() {
                            out.push((byte as u8, node));
                        }
                        *slot = 0;
                    }
                }
                out
            }
            Children::Node256 { nodes, count } => {
                *count = 0;
                nodes
                    .iter_mut()
                    .enumerate()
                    .filter_map(|(byte, slot)| slot.take().map(|node| (byte as u8, node)))
                    .collect()
            }
        }
    }

    fn rebuild(&mut self, mut target: Children) {
        for (byte, node) in self.drain() {
            target.push(byte, node);
        }
        *self = target;
    }
}
