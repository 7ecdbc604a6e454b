//! # CaskDB
//!
//! An embedded Bitcask key-value storage engine with:
//! - Append-only, CRC-protected log segments
//! - In-memory index mapping every live key to its record
//! - Crash recovery, including atomic multi-key batches
//! - Online merge with hint files for fast restarts
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │       put / get / delete / batch / fold / merge             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  RwLock (single writer / many readers)
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Index     │          │  Segments   │
//!   │ key → pos   │─────────▶│ active +    │
//!   └─────────────┘          │ immutable   │
//!                            └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │ I/O backend │
//!                           │ file / mmap │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod layout;

pub mod record;
pub mod io;
pub mod segment;
pub mod index;
pub mod engine;

mod fs_util;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, IndexKind, IteratorOptions, WriteBatchOptions};
pub use engine::{Engine, EngineIterator, Stat, WriteBatch};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CaskDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
