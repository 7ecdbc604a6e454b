//! Error types for CaskDB
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for CaskDB operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Validation Errors
    // -------------------------------------------------------------------------
    #[error("Key is empty")]
    EmptyKey,

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Corruption Errors
    // -------------------------------------------------------------------------
    #[error("Record CRC mismatch")]
    CrcMismatch,

    #[error("Corrupted record: {0}")]
    Corruption(String),

    #[error("Data directory error: {0}")]
    DataDirectory(String),

    // -------------------------------------------------------------------------
    // Resource Contention Errors
    // -------------------------------------------------------------------------
    #[error("Data directory {0} is already open in another process")]
    DirectoryLocked(PathBuf),

    #[error("A merge is already in progress")]
    MergeInProgress,

    #[error("Reclaimable ratio {ratio:.3} is below merge threshold {threshold:.3}")]
    MergeRatioNotReached { ratio: f32, threshold: f32 },

    #[error("Not enough disk space for merge: need {required} bytes, {available} available")]
    InsufficientDiskSpace { required: u64, available: u64 },

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Batch holds {count} operations, maximum is {max}")]
    BatchTooLarge { count: usize, max: usize },

    // -------------------------------------------------------------------------
    // Consistency Errors
    // -------------------------------------------------------------------------
    #[error("Failed to update index")]
    IndexUpdateFailed,

    #[error("Segment {0} not found")]
    SegmentNotFound(u32),
}
