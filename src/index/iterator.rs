//! Snapshot iterator
//!
//! Copies the index entries at creation time so the cursor never holds a
//! borrow on the live index.

use crate::record::RecordPos;

use super::IndexIterator;

pub struct SnapshotIterator {
    /// Entries in iteration order (descending when reversed)
    entries: Vec<(Vec<u8>, RecordPos)>,
    cursor: usize,
    reverse: bool,
}

impl SnapshotIterator {
    /// `entries` must be sorted ascending by key
    pub fn new(mut entries: Vec<(Vec<u8>, RecordPos)>, reverse: bool) -> Self {
        if reverse {
            entries.reverse();
        }
        Self {
            entries,
            cursor: 0,
            reverse,
        }
    }
}

impl IndexIterator for SnapshotIterator {
    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn seek(&mut self, key: &[u8]) {
        self.cursor = if self.reverse {
            self.entries.partition_point(|(k, _)| k.as_slice() > key)
        } else {
            self.entries.partition_point(|(k, _)| k.as_slice() < key)
        };
    }

    fn next(&mut self) {
        self.cursor += 1;
    }

    fn valid(&self) -> bool {
        self.cursor < self.entries.len()
    }

    fn key(&self) -> &[u8] {
        &self.entries[self.cursor].0
    }

    fn value(&self) -> RecordPos {
        self.entries[self.cursor].1
    }
}
