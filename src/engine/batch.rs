//! Atomic write batch
//!
//! Stages puts and deletes in memory and commits them as one crash-atomic
//! group.
//!
//! ## Commit Layout
//! ```text
//! [seq|k1 Normal] [seq|k2 Tombstone] ... [seq|txn-fin Commit]
//! ```
//! Replay only applies records tagged `seq` after it reaches the commit
//! marker, so a crash before the marker is durable drops the whole group.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::config::WriteBatchOptions;
use crate::error::{CaskError, Result};
use crate::record::key::{encode_key, TXN_FIN_KEY};
use crate::record::{Record, RecordKind};

use super::Engine;

/// A group of mutations committed atomically
pub struct WriteBatch<'a> {
    engine: &'a Engine,
    options: WriteBatchOptions,

    /// Staged records keyed by user key (last write wins)
    pending: Mutex<BTreeMap<Vec<u8>, Record>>,
}

impl<'a> WriteBatch<'a> {
    pub(super) fn new(engine: &'a Engine, options: WriteBatchOptions) -> Self {
        Self {
            engine,
            options,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    /// Stage a put
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        self.pending
            .lock()
            .insert(key.to_vec(), Record::normal(key.to_vec(), value.to_vec()));
        Ok(())
    }

    /// Stage a delete.
    ///
    /// If the key is not stored in the engine this only drops a staged put.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let mut pending = self.pending.lock();
        if self.engine.state.read().index.get(key).is_none() {
            pending.remove(key);
            return Ok(());
        }

        pending.insert(key.to_vec(), Record::tombstone(key.to_vec()));
        Ok(())
    }

    /// Number of staged operations
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write all staged records plus a commit marker, then update the index
    pub fn commit(&self) -> Result<()> {
        let mut pending = self.pending.lock();

        if pending.is_empty() {
            return Ok(());
        }
        if pending.len() > self.options.max_batch_ops {
            return Err(CaskError::BatchTooLarge {
                count: pending.len(),
                max: self.options.max_batch_ops,
            });
        }

        let config = &self.engine.config;
        let mut state = self.engine.state.write();

        state.txn_seq += 1;
        let seq = state.txn_seq;

        let mut positions = Vec::with_capacity(pending.len());
        for (key, record) in pending.iter() {
            let tagged = Record {
                key: encode_key(key, seq),
                value: record.value.clone(),
                kind: record.kind,
            };
            positions.push(state.append(config, &tagged)?);
        }

        let marker = Record {
            key: encode_key(TXN_FIN_KEY, seq),
            value: Vec::new(),
            kind: RecordKind::Commit,
        };
        state.append(config, &marker)?;

        if self.options.sync_on_commit {
            state.active.sync()?;
            state.bytes_since_sync = 0;
        }

        for ((key, record), pos) in pending.iter().zip(positions) {
            match record.kind {
                RecordKind::Tombstone => {
                    state.index_delete(key, pos);
                }
                _ => state.index_put(key.clone(), pos),
            }
        }

        tracing::debug!("Committed batch {} with {} operations", seq, pending.len());

        pending.clear();
        Ok(())
    }
}
