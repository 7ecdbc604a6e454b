//! I/O Backend Module
//!
//! Raw file access underneath a segment.
//!
//! ## Backends
//! - [`FileIo`]: read/write through the OS page cache, appends only
//! - [`MmapIo`]: read-only memory map, used to speed up replay on open

mod file;
mod mmap;

use std::path::Path;

use crate::error::Result;

pub use file::FileIo;
pub use mmap::MmapIo;

/// Which backend to open a segment with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    File,
    Mmap,
}

/// Positional reads and appending writes over one file
pub trait IoBackend: Send + Sync {
    /// Read into `buf` starting at `offset`; returns bytes read (short at EOF)
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Append all of `buf`; returns bytes written
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush written data to stable storage
    fn sync(&self) -> Result<()>;

    /// Current file size in bytes
    fn size(&self) -> Result<u64>;
}

/// Open `path` with the requested backend, creating the file if missing
pub fn open_backend(path: &Path, kind: IoKind) -> Result<Box<dyn IoBackend>> {
    Ok(match kind {
        IoKind::File => Box::new(FileIo::open(path)?),
        IoKind::Mmap => Box::new(MmapIo::open(path)?),
    })
}
