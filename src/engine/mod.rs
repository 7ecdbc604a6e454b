//! Engine Module
//!
//! The Bitcask engine that coordinates segments, the index and merges.
//!
//! ## Responsibilities
//! - Append every mutation to the active segment before touching the index
//! - Rotate the active segment once it reaches the size threshold
//! - Serve point reads from whichever segment the index points at
//! - Rebuild the index on open (hint file first, then segment replay)
//! - Hold the data directory lock for the lifetime of the handle

mod batch;
mod iterator;
mod merge;
mod recovery;

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use fs2::FileExt;
use parking_lot::RwLock;

use crate::config::{Config, IteratorOptions, WriteBatchOptions};
use crate::error::{CaskError, Result};
use crate::fs_util;
use crate::index::Indexer;
use crate::io::IoKind;
use crate::layout;
use crate::record::key::{encode_key, NON_TXN_SEQ};
use crate::record::{encode_record, Record, RecordKind, RecordPos};
use crate::segment::Segment;

pub use batch::WriteBatch;
pub use iterator::EngineIterator;

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch commit/rotation): exclusive `state` lock
///   held across append + index update, so index order equals log order
/// - **Reads** (get/list_keys/fold/iterators): shared `state` lock
/// - **Merge**: exclusive lock only to rotate and snapshot the immutable
///   segments; the copy itself runs against `Arc<Segment>` handles
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Segments, index and counters
    state: RwLock<DbState>,

    /// Set while a merge is running
    merging: AtomicBool,

    /// Advisory lock on `{data_dir}/flock`
    lock_file: File,
}

/// Everything guarded by the engine lock
pub(crate) struct DbState {
    /// Append target
    active: Segment,

    /// Sealed segments by id
    immutables: BTreeMap<u32, Arc<Segment>>,

    index: Box<dyn Indexer>,

    /// Last batch sequence number handed out
    txn_seq: u64,

    /// Bytes held by superseded or deleted records
    reclaimable: u64,

    /// Bytes appended since the last sync
    bytes_since_sync: u64,
}

/// Point-in-time engine statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// Active + immutable segments
    pub segment_count: usize,
    pub key_count: usize,
    pub reclaimable_bytes: u64,
    /// Bytes used by the data directory
    pub disk_usage: u64,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate config and create the data directory
    /// 2. Take the directory lock (fails if another process holds it)
    /// 3. Finish or discard an interrupted merge
    /// 4. Load the hint file, replay remaining segments
    /// 5. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(layout::lock_path(&config.data_dir))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CaskError::DirectoryLocked(config.data_dir.clone()));
        }

        merge::reconcile(&config.data_dir)?;

        let state = recovery::recover(&config)?;

        tracing::info!(
            "Opened {}: {} segments, {} keys, active segment {} at offset {}",
            config.data_dir.display(),
            state.immutables.len() + 1,
            state.index.len(),
            state.active.id(),
            state.active.write_cursor()
        );

        Ok(Self {
            config,
            state: RwLock::new(state),
            merging: AtomicBool::new(false),
            lock_file,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Store a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let record = Record::normal(encode_key(key, NON_TXN_SEQ), value.to_vec());

        let mut state = self.state.write();
        let pos = state.append(&self.config, &record)?;
        state.index_put(key.to_vec(), pos);

        Ok(())
    }

    /// Get a value by key
    ///
    /// Returns `Err(KeyNotFound)` for absent or deleted keys.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let state = self.state.read();
        let pos = state.index.get(key).ok_or(CaskError::KeyNotFound)?;
        state.read_value(pos)
    }

    /// Delete a key (no-op if absent)
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(CaskError::EmptyKey);
        }

        let mut state = self.state.write();
        if state.index.get(key).is_none() {
            return Ok(());
        }

        let record = Record::tombstone(encode_key(key, NON_TXN_SEQ));
        let pos = state.append(&self.config, &record)?;
        state
            .index_delete(key, pos)
            .ok_or(CaskError::IndexUpdateFailed)?;

        Ok(())
    }

    /// All live keys in ascending order
    pub fn list_keys(&self) -> Vec<Vec<u8>> {
        let state = self.state.read();
        let mut iter = state.index.iterator(false);
        let mut keys = Vec::with_capacity(state.index.len());

        iter.rewind();
        while iter.valid() {
            keys.push(iter.key().to_vec());
            iter.next();
        }
        keys
    }

    /// Visit every live pair in key order until `f` returns false
    pub fn fold<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let state = self.state.read();
        let mut iter = state.index.iterator(false);

        iter.rewind();
        while iter.valid() {
            let value = state.read_value(iter.value())?;
            if !f(iter.key(), &value) {
                break;
            }
            iter.next();
        }
        Ok(())
    }

    /// Cursor over live keys
    pub fn iter(&self, options: IteratorOptions) -> EngineIterator<'_> {
        let inner = self.state.read().index.iterator(options.reverse);
        EngineIterator::new(self, inner, options.prefix)
    }

    /// Start an atomic batch
    pub fn new_write_batch(&self, options: WriteBatchOptions) -> WriteBatch<'_> {
        WriteBatch::new(self, options)
    }

    /// fsync the active segment
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.write();
        state.active.sync()?;
        state.bytes_since_sync = 0;
        Ok(())
    }

    /// Sync and release the data directory
    pub fn close(self) -> Result<()> {
        self.sync()?;
        FileExt::unlock(&self.lock_file)?;
        tracing::info!("Closed {}", self.config.data_dir.display());
        Ok(())
    }

    /// Current statistics
    pub fn stat(&self) -> Result<Stat> {
        let state = self.state.read();
        Ok(Stat {
            segment_count: state.immutables.len() + 1,
            key_count: state.index.len(),
            reclaimable_bytes: state.reclaimable,
            disk_usage: fs_util::dir_size(&self.config.data_dir)?,
        })
    }

    /// Copy the data directory (minus the lock file) to `dest`
    pub fn backup(&self, dest: &Path) -> Result<()> {
        let _state = self.state.read();
        fs_util::copy_dir(&self.config.data_dir, dest, &[layout::LOCK_FILE])
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn active_segment_id(&self) -> u32 {
        self.state.read().active.id()
    }

    pub fn active_write_cursor(&self) -> u64 {
        self.state.read().active.write_cursor()
    }

    pub fn immutable_segment_count(&self) -> usize {
        self.state.read().immutables.len()
    }

    pub fn key_count(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn reclaimable_bytes(&self) -> u64 {
        self.state.read().reclaimable
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.state.get_mut().active.sync() {
            tracing::warn!(
                "Failed to sync active segment of {} on drop: {}",
                self.config.data_dir.display(),
                e
            );
        }
    }
}

impl DbState {
    /// Append one record to the active segment, rotating first if it would
    /// overflow the segment size. Caller holds the write lock.
    fn append(&mut self, config: &Config, record: &Record) -> Result<RecordPos> {
        let encoded = encode_record(record);
        let size = encoded.len() as u64;

        if self.active.write_cursor() > 0
            && self.active.write_cursor() + size > config.segment_size
        {
            self.rotate(config)?;
        }

        let offset = self.active.write_cursor();
        self.active.write(&encoded)?;
        self.bytes_since_sync += size;

        if config.sync_writes || self.bytes_since_sync >= config.bytes_per_sync {
            self.active.sync()?;
            self.bytes_since_sync = 0;
        }

        Ok(RecordPos {
            segment_id: self.active.id(),
            offset,
            size: size as u32,
        })
    }

    /// Seal the active segment and start the next one
    fn rotate(&mut self, config: &Config) -> Result<()> {
        self.active.sync()?;
        self.bytes_since_sync = 0;

        let next = Segment::open(&config.data_dir, self.active.id() + 1, IoKind::File)?;
        let sealed = std::mem::replace(&mut self.active, next);

        tracing::debug!(
            "Sealed segment {} at {} bytes, active segment is now {}",
            sealed.id(),
            sealed.write_cursor(),
            self.active.id()
        );

        self.immutables.insert(sealed.id(), Arc::new(sealed));
        Ok(())
    }

    fn segment(&self, id: u32) -> Result<&Segment> {
        if self.active.id() == id {
            return Ok(&self.active);
        }
        self.immutables
            .get(&id)
            .map(|segment| segment.as_ref())
            .ok_or(CaskError::SegmentNotFound(id))
    }

    /// Resolve an index entry to its value
    fn read_value(&self, pos: RecordPos) -> Result<Vec<u8>> {
        let segment = self.segment(pos.segment_id)?;
        match segment.read_record(pos.offset)? {
            Some((record, _)) if record.kind == RecordKind::Tombstone => {
                Err(CaskError::KeyNotFound)
            }
            Some((record, _)) => Ok(record.value),
            None => Err(CaskError::Corruption(format!(
                "no record at segment {} offset {}",
                pos.segment_id, pos.offset
            ))),
        }
    }

    fn index_put(&mut self, key: Vec<u8>, pos: RecordPos) {
        apply_to_index(
            self.index.as_mut(),
            &mut self.reclaimable,
            key,
            RecordKind::Normal,
            pos,
        );
    }

    /// Remove `key`, crediting both the tombstone and the removed record
    fn index_delete(&mut self, key: &[u8], tombstone: RecordPos) -> Option<RecordPos> {
        apply_to_index(
            self.index.as_mut(),
            &mut self.reclaimable,
            key.to_vec(),
            RecordKind::Tombstone,
            tombstone,
        )
    }
}

/// Apply one logged mutation to the index.
///
/// Returns the superseded location; its size, and the tombstone's own size
/// for deletes, are added to `reclaimable`.
pub(crate) fn apply_to_index(
    index: &mut dyn Indexer,
    reclaimable: &mut u64,
    key: Vec<u8>,
    kind: RecordKind,
    pos: RecordPos,
) -> Option<RecordPos> {
    let old = match kind {
        RecordKind::Normal => index.put(key, pos),
        RecordKind::Tombstone => {
            *reclaimable += pos.size as u64;
            index.delete(&key)
        }
        RecordKind::Commit => None,
    };

    if let Some(old) = old {
        *reclaimable += old.size as u64;
    }
    old
}
