//! Record Module
//!
//! The durable unit of the log and its on-disk encoding.
//!
//! ## Record Format
//! ```text
//! ┌─────────┬──────────┬──────────────┬──────────────┬─────────┬───────────┐
//! │ CRC (4) │ Kind (1) │ KeyLen (≤5)  │ ValLen (≤5)  │   Key   │   Value   │
//! └─────────┴──────────┴──────────────┴──────────────┴─────────┴───────────┘
//! ```
//! - CRC32 (IEEE, little-endian) covers every byte after itself
//! - Lengths are zigzag varints
//!
//! Keys written by the engine carry a transaction sequence prefix
//! (see [`key`]); sequence `0` means the record is not part of a batch.

mod codec;
pub mod key;

pub use codec::{
    decode_header, decode_record, encode_record, RecordHeader, CRC_SIZE, MAX_HEADER_SIZE,
    MIN_HEADER_SIZE,
};
pub use codec::{decode_varint, decode_uvarint, encode_uvarint, encode_varint};

use crate::error::{CaskError, Result};

/// Kind of a log record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// A live value
    Normal = 0,

    /// Key deletion
    Tombstone = 1,

    /// Closes an atomic batch
    Commit = 2,
}

impl TryFrom<u8> for RecordKind {
    type Error = CaskError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(RecordKind::Normal),
            1 => Ok(RecordKind::Tombstone),
            2 => Ok(RecordKind::Commit),
            other => Err(CaskError::Corruption(format!(
                "unknown record kind {}",
                other
            ))),
        }
    }
}

/// A single log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub kind: RecordKind,
}

impl Record {
    pub fn normal(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            kind: RecordKind::Normal,
        }
    }

    pub fn tombstone(key: Vec<u8>) -> Self {
        Self {
            key,
            value: Vec::new(),
            kind: RecordKind::Tombstone,
        }
    }
}

/// Location of one physical record (index entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPos {
    /// Segment holding the record
    pub segment_id: u32,

    /// Byte offset of the record inside the segment
    pub offset: u64,

    /// Encoded length, counted as reclaimable once superseded
    pub size: u32,
}

impl RecordPos {
    /// Encode as three unsigned varints (hint payload)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20);
        encode_uvarint(self.segment_id as u64, &mut buf);
        encode_uvarint(self.offset, &mut buf);
        encode_uvarint(self.size as u64, &mut buf);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        let malformed = || CaskError::Corruption("malformed record position".to_string());

        let (segment_id, n1) = decode_uvarint(buf).ok_or_else(malformed)?;
        let (offset, n2) = decode_uvarint(&buf[n1..]).ok_or_else(malformed)?;
        let (size, _) = decode_uvarint(&buf[n1 + n2..]).ok_or_else(malformed)?;

        Ok(Self {
            segment_id: u32::try_from(segment_id).map_err(|_| malformed())?,
            offset,
            size: u32::try_from(size).map_err(|_| malformed())?,
        })
    }
}
