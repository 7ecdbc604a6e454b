//! Configuration for CaskDB
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Main configuration for a CaskDB instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── 000000000.data   (segments, ascending id)
    ///     ├── hint-index       (written by merge)
    ///     ├── merge-finished   (written by merge)
    ///     └── flock            (process lock)
    pub data_dir: PathBuf,

    /// Rotate the active segment once appending would exceed this size (bytes)
    pub segment_size: u64,

    // -------------------------------------------------------------------------
    // Durability Configuration
    // -------------------------------------------------------------------------
    /// fsync after every append
    pub sync_writes: bool,

    /// fsync once this many bytes were appended since the last sync
    pub bytes_per_sync: u64,

    /// Open segments memory-mapped for replay, then switch to file I/O
    pub mmap_at_startup: bool,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    pub index_kind: IndexKind,

    // -------------------------------------------------------------------------
    // Merge Configuration
    // -------------------------------------------------------------------------
    /// Minimum reclaimable/total byte ratio before a merge may run (0.0..=1.0)
    pub merge_ratio: f32,
}

/// In-memory index implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// `BTreeMap` ordered tree
    BTree,

    /// Adaptive radix tree
    Art,

    /// Lock-free ordered skip list
    SkipList,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("caskdb"),
            segment_size: 256 * 1024 * 1024, // 256 MB
            sync_writes: false,
            bytes_per_sync: 4 * 1024 * 1024, // 4 MB
            mmap_at_startup: true,
            index_kind: IndexKind::BTree,
            merge_ratio: 0.5,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(CaskError::Config("data directory is empty".to_string()));
        }
        if self.segment_size == 0 {
            return Err(CaskError::Config(
                "segment size must be positive".to_string(),
            ));
        }
        if self.bytes_per_sync == 0 {
            return Err(CaskError::Config(
                "bytes per sync must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.merge_ratio) {
            return Err(CaskError::Config(format!(
                "merge ratio {} is not in [0, 1]",
                self.merge_ratio
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn segment_size(mut self, size: u64) -> Self {
        self.config.segment_size = size;
        self
    }

    /// Sync after every write
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.config.sync_writes = sync;
        self
    }

    /// Set the periodic sync threshold (in bytes)
    pub fn bytes_per_sync(mut self, bytes: u64) -> Self {
        self.config.bytes_per_sync = bytes;
        self
    }

    /// Memory-map segments while replaying on open
    pub fn mmap_at_startup(mut self, enabled: bool) -> Self {
        self.config.mmap_at_startup = enabled;
        self
    }

    /// Set the index implementation
    pub fn index_kind(mut self, kind: IndexKind) -> Self {
        self.config.index_kind = kind;
        self
    }

    /// Set the merge ratio threshold
    pub fn merge_ratio(mut self, ratio: f32) -> Self {
        self.config.merge_ratio = ratio;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Options for an atomic write batch
#[derive(Debug, Clone, Copy)]
pub struct WriteBatchOptions {
    /// Maximum number of staged operations per commit
    pub max_batch_ops: usize,

    /// fsync the active segment after the commit marker is written
    pub sync_on_commit: bool,
}

impl Default for WriteBatchOptions {
    fn default() -> Self {
        Self {
            max_batch_ops: 10_000,
            sync_on_commit: false,
        }
    }
}

/// Options for iterating over the engine
#[derive(Debug, Clone, Default)]
pub struct IteratorOptions {
    /// Only yield keys starting with this prefix (empty = all keys)
    pub prefix: Vec<u8>,

    /// Iterate in descending key order
    pub reverse: bool,
}
