//! Skip-list index
//!
//! Backed by `crossbeam_skiplist::SkipMap`. Mutations already run under the
//! engine's writer lock, so read-then-insert is not racy here.

use crossbeam_skiplist::SkipMap;

use crate::record::RecordPos;

use super::{IndexIterator, Indexer, SnapshotIterator};

pub struct SkipListIndex {
    map: SkipMap<Vec<u8>, RecordPos>,
}

impl SkipListIndex {
    pub fn new() -> Self {
        Self {
            map: SkipMap::new(),
        }
    }
}

impl Default for SkipListIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl Indexer for SkipListIndex {
    fn put(&mut self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos> {
        let old = self.get(&key);
        self.map.insert(key, pos);
        old
    }

    fn get(&self, key: &[u8]) -> Option<RecordPos> {
        self.map.get(key).map(|entry| *entry.value())
    }

    fn delete(&mut self, key: &[u8]) -> Option<RecordPos> {
        self.map.remove(key).map(|entry| *entry.value())
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator> {
        let entries = self
            .map
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        Box::new(SnapshotIterator::new(entries, reverse))
    }
}
