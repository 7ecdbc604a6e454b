//! Engine iterator
//!
//! Walks a snapshot of the index, optionally restricted to a key prefix.
//! Values are read lazily under the shared engine lock.

use crate::error::Result;
use crate::index::IndexIterator;

use super::Engine;

/// Cursor over live keys in key order
pub struct EngineIterator<'a> {
    engine: &'a Engine,
    inner: Box<dyn IndexIterator>,
    prefix: Vec<u8>,
}

impl<'a> EngineIterator<'a> {
    pub(super) fn new(engine: &'a Engine, inner: Box<dyn IndexIterator>, prefix: Vec<u8>) -> Self {
        let mut iter = Self {
            engine,
            inner,
            prefix,
        };
        iter.rewind();
        iter
    }

    /// Move to the first matching key
    pub fn rewind(&mut self) {
        self.inner.rewind();
        self.skip_to_prefix();
    }

    /// Move to the first matching key >= `key` (<= when reversed)
    pub fn seek(&mut self, key: &[u8]) {
        self.inner.seek(key);
        self.skip_to_prefix();
    }

    pub fn next(&mut self) {
        self.inner.next();
    }

    /// Keys sharing a prefix are contiguous, so leaving the run ends iteration
    pub fn valid(&self) -> bool {
        self.inner.valid() && self.inner.key().starts_with(&self.prefix)
    }

    pub fn key(&self) -> &[u8] {
        self.inner.key()
    }

    /// Read the current value from its segment
    pub fn value(&self) -> Result<Vec<u8>> {
        let pos = self.inner.value();
        self.engine.state.read().read_value(pos)
    }

    fn skip_to_prefix(&mut self) {
        if self.prefix.is_empty() {
            return;
        }
        while self.inner.valid() && !self.inner.key().starts_with(&self.prefix) {
            self.inner.next();
        }
    }
}
