//! Index Module
//!
//! In-memory map from user key to the location of its live record.
//!
//! ## Responsibilities
//! - One entry per live key, replaced on put, removed on delete
//! - Return the superseded location so the engine can count reclaimable bytes
//! - Ordered iteration (forward, reverse, seek) for list/fold/iterators
//!
//! ## Implementations
//! - [`BTreeIndex`]: `BTreeMap`, the default
//! - [`ArtIndex`]: adaptive radix tree with path compression
//! - [`SkipListIndex`]: crossbeam lock-free skip list

mod art;
mod btree;
mod iterator;
mod skiplist;

pub use art::ArtIndex;
pub use btree::BTreeIndex;
pub use iterator::SnapshotIterator;
pub use skiplist::SkipListIndex;

use crate::config::IndexKind;
use crate::record::RecordPos;

/// Key → record location map
pub trait Indexer: Send + Sync {
    /// Insert or replace; returns the previous location
    fn put(&mut self, key: Vec<u8>, pos: RecordPos) -> Option<RecordPos>;

    fn get(&self, key: &[u8]) -> Option<RecordPos>;

    /// Remove; returns the removed location (`None` if the key was absent)
    fn delete(&mut self, key: &[u8]) -> Option<RecordPos>;

    /// Number of live keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordered cursor over a snapshot of the entries
    fn iterator(&self, reverse: bool) -> Box<dyn IndexIterator>;
}

/// Cursor over (key, location) pairs
pub trait IndexIterator: Send {
    /// Back to the first entry
    fn rewind(&mut self);

    /// First entry >= `key` (<= `key` when reversed)
    fn seek(&mut self, key: &[u8]);

    fn next(&mut self);

    fn valid(&self) -> bool;

    /// Current key; only meaningful while `valid()`
    fn key(&self) -> &[u8];

    /// Current location; only meaningful while `valid()`
    fn value(&self) -> RecordPos;
}

/// Build an empty index of the given kind
pub fn new_indexer(kind: IndexKind) -> Box<dyn Indexer> {
    match kind {
        IndexKind::BTree => Box::new(BTreeIndex::new()),
        IndexKind::Art => Box::new(ArtIndex::new()),
        IndexKind::SkipList => Box::new(SkipListIndex::new()),
    }
}
