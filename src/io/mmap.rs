//! Memory-mapped backend
//!
//! Maps the whole file read-only at open time. Writes are rejected; the
//! engine swaps in a [`FileIo`](super::FileIo) before accepting appends.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Result;

use super::IoBackend;

pub struct MmapIo {
    /// `None` for an empty file, which cannot be mapped
    map: Option<Mmap>,
}

impl MmapIo {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;

        let map = if file.metadata()?.len() == 0 {
            None
        } else {
            // SAFETY: segments are append-only and never truncated while mapped
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self { map })
    }

    fn bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }
}

impl IoBackend for MmapIo {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let data = self.bytes();
        if offset >= data.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "memory-mapped segment is read-only").into())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.bytes().len() as u64)
    }
}
