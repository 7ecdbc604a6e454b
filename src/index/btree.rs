//! BTreeMap index

use std::collections::BTreeMap;

use crate::record::RecordPos;

use super::{IndexIterator, Indexer, SnapshotIterator};

/// Ordered-tree index backed by `BTreeMap`
#[derive(Debug, Default)]
pub struct BTreeIndex {
    tree: BTreeMap<Vec<u8>, RecordPos>,
}

impl BTreeIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indexer for BTreeIndex {
    fn put(&mut self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos> {
        self.tree.insert(key, pos)
    }

    fn get(&self, key: &[u8]) -> Option<RecordPos> {
        self.tree.get(key).copied()
    }

    fn delete(&mut self, key: &[u8]) -> Option<RecordPos> {
        self.tree.remove(key)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator> {
        let entries = self.tree.iter().map(|(k, v)| (k.clone(), *v)).collect();
        Box::new(SnapshotIterator::new(entries, reverse))
    }
}
