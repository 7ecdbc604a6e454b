//! Segment Module
//!
//! One append-only log file on disk.
//!
//! ## Responsibilities
//! - Append encoded records and track the write cursor
//! - Decode the record stored at a given offset
//! - Sync and backend switching (mmap for replay, file I/O for writes)
//! - Hint entries and the merge-finished marker reuse the same format

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CaskError, Result};
use crate::io::{open_backend, IoBackend, IoKind};
use crate::layout;
use crate::record::{decode_header, encode_record, Record, RecordPos, MAX_HEADER_SIZE};

/// An append-only log segment
pub struct Segment {
    /// Segment id (defines recency across files)
    id: u32,

    /// Offset the next append lands at
    write_cursor: u64,

    /// File backing this segment
    path: PathBuf,

    backend: Box<dyn IoBackend>,
}

impl Segment {
    /// Open (or create) segment `id` inside `dir`
    pub fn open(dir: &Path, id: u32, kind: IoKind) -> Result<Self> {
        Self::open_path(layout::segment_path(dir, id), id, kind)
    }

    /// Open (or create) the hint file inside `dir`
    pub fn open_hint(dir: &Path) -> Result<Self> {
        Self::open_path(layout::hint_path(dir), 0, IoKind::File)
    }

    /// Open (or create) the merge-finished marker inside `dir`
    pub fn open_merge_finished(dir: &Path) -> Result<Self> {
        Self::open_path(layout::merge_finished_path(dir), 0, IoKind::File)
    }

    fn open_path(path: PathBuf, id: u32, kind: IoKind) -> Result<Self> {
        let backend = open_backend(&path, kind)?;
        Ok(Self {
            id,
            write_cursor: 0,
            path,
            backend,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn write_cursor(&self) -> u64 {
        self.write_cursor
    }

    /// Resume appending at `offset` (set after replay)
    pub fn set_write_cursor(&mut self, offset: u64) {
        self.write_cursor = offset;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> Result<u64> {
        self.backend.size()
    }

    /// Append raw bytes, advancing the cursor
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let n = self.backend.write(buf)?;
        if n != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write to segment {}: {} of {} bytes", self.id, n, buf.len()),
            )
            .into());
        }
        self.write_cursor += n as u64;
        Ok(())
    }

    /// Read the record at `offset`.
    ///
    /// Returns the record with its encoded length, or `Ok(None)` when
    /// `offset` is at or past the last valid record.
    pub fn read_record(&self, offset: u64) -> Result<Option<(Record, u64)>> {
        let file_size = self.backend.size()?;
        if offset >= file_size {
            return Ok(None);
        }

        // Header window, clamped to the end of the file
        let window = (MAX_HEADER_SIZE as u64).min(file_size - offset) as usize;
        let mut header_buf = vec![0u8; window];
        let n = self.backend.read_at(&mut header_buf, offset)?;
        header_buf.truncate(n);

        let header = match decode_header(&header_buf)? {
            Some(header) => header,
            None => return Ok(None),
        };

        // Lengths come from disk; check them before allocating the body
        let record_size = header.record_size() as u64;
        if record_size > file_size - offset {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "segment {} offset {}: record of {} bytes runs past end of file ({} bytes)",
                    self.id, offset, record_size, file_size
                ),
            )
            .into());
        }

        let kv_len = header.key_size as usize + header.value_size as usize;
        let mut kv = vec![0u8; kv_len];
        if kv_len > 0 {
            let n = self
                .backend
                .read_at(&mut kv, offset + header.header_size as u64)?;
            if n != kv_len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "segment {} offset {}: expected {} body bytes, read {}",
                        self.id, offset, kv_len, n
                    ),
                )
                .into());
            }
        }

        let record = header.into_record(&header_buf, kv)?;
        Ok(Some((record, record_size)))
    }

    /// Append a hint entry mapping `key` to `pos`
    pub fn write_hint(&mut self, key: &[u8], pos: &RecordPos) -> Result<()> {
        let record = Record::normal(key.to_vec(), pos.encode());
        self.write(&encode_record(&record))
    }

    /// Force written data to disk
    pub fn sync(&self) -> Result<()> {
        self.backend.sync()
    }

    /// Drop bytes past the write cursor (a torn or zeroed tail left by a
    /// crash) so the next append lands where the index expects it.
    /// Returns the number of bytes removed.
    pub fn truncate_to_cursor(&mut self) -> Result<u64> {
        let size = self.backend.size()?;
        if size <= self.write_cursor {
            return Ok(0);
        }

        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(self.write_cursor)?;
        file.sync_all()?;
        Ok(size - self.write_cursor)
    }

    /// Reopen this segment's file with a different backend
    pub fn set_backend(&mut self, kind: IoKind) -> Result<()> {
        self.backend = open_backend(&self.path, kind)?;
        Ok(())
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("write_cursor", &self.write_cursor)
            .field("path", &self.path)
            .finish()
    }
}

/// Read the merge boundary id stored in `dir`'s merge-finished marker
pub fn read_merge_boundary(dir: &Path) -> Result<u32> {
    let marker = Segment::open_merge_finished(dir)?;
    let (record, _) = marker
        .read_record(0)?
        .ok_or_else(|| CaskError::Corruption("empty merge-finished marker".to_string()))?;

    std::str::from_utf8(&record.value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            CaskError::Corruption(format!(
                "invalid merge boundary {:?}",
                String::from_utf8_lossy(&record.value)
            ))
        })
}
