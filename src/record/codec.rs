//! Record codec
//!
//! Encoding and decoding of single log records, plus the varint helpers
//! shared with the hint and transaction-key formats.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CaskError, Result};

use super::{Record, RecordKind};

/// CRC field size
pub const CRC_SIZE: usize = 4;

/// Smallest window a header can be decoded from: CRC (4) + Kind (1)
pub const MIN_HEADER_SIZE: usize = CRC_SIZE + 1;

/// Largest possible header: CRC (4) + Kind (1) + two 5-byte varints
pub const MAX_HEADER_SIZE: usize = MIN_HEADER_SIZE + 2 * MAX_VARINT_LEN32;

const MAX_VARINT_LEN32: usize = 5;
const MAX_VARINT_LEN64: usize = 10;

// =============================================================================
// Varints
// =============================================================================

/// Append `value` as an unsigned LEB128 varint
pub fn encode_uvarint<B: BufMut>(mut value: u64, buf: &mut B) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Append `value` as a zigzag signed varint
pub fn encode_varint<B: BufMut>(value: i64, buf: &mut B) {
    let zigzag = ((value << 1) ^ (value >> 63)) as u64;
    encode_uvarint(zigzag, buf);
}

/// Decode an unsigned varint, returning the value and bytes consumed.
/// `None` if the input ends mid-varint or overflows 64 bits.
pub fn decode_uvarint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in buf.iter().enumerate().take(MAX_VARINT_LEN64) {
        if i == MAX_VARINT_LEN64 - 1 && byte > 1 {
            return None;
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte < 0x80 {
            return Some((value, i + 1));
        }
        shift += 7;
    }
    None
}

/// Decode a zigzag signed varint
pub fn decode_varint(buf: &[u8]) -> Option<(i64, usize)> {
    let (zigzag, n) = decode_uvarint(buf)?;
    let value = ((zigzag >> 1) as i64) ^ -((zigzag & 1) as i64);
    Some((value, n))
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode a record to its exact on-disk bytes
pub fn encode_record(record: &Record) -> Bytes {
    let mut buf =
        BytesMut::with_capacity(MAX_HEADER_SIZE + record.key.len() + record.value.len());

    // CRC placeholder, patched once the rest is written
    buf.put_u32_le(0);
    buf.put_u8(record.kind as u8);
    encode_varint(record.key.len() as i64, &mut buf);
    encode_varint(record.value.len() as i64, &mut buf);
    buf.put_slice(&record.key);
    buf.put_slice(&record.value);

    let crc = crc32fast::hash(&buf[CRC_SIZE..]);
    buf[..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());

    buf.freeze()
}

// =============================================================================
// Decoding
// =============================================================================

/// Decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub crc: u32,
    pub kind: u8,
    pub key_size: u32,
    pub value_size: u32,
    /// Bytes occupied by the header itself (CRC included)
    pub header_size: usize,
}

impl RecordHeader {
    /// Total encoded length of the record
    pub fn record_size(&self) -> usize {
        self.header_size + self.key_size as usize + self.value_size as usize
    }

    /// Verify the CRC and build the record.
    ///
    /// `header_buf` must start at the record (CRC included); `kv` holds
    /// exactly `key_size + value_size` bytes.
    pub fn into_record(self, header_buf: &[u8], mut kv: Vec<u8>) -> Result<Record> {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header_buf[CRC_SIZE..self.header_size]);
        hasher.update(&kv);
        if hasher.finalize() != self.crc {
            return Err(CaskError::CrcMismatch);
        }

        let kind = RecordKind::try_from(self.kind)?;
        let value = kv.split_off(self.key_size as usize);

        Ok(Record {
            key: kv,
            value,
            kind,
        })
    }
}

/// Decode a header from the start of `buf`.
///
/// Returns `Ok(None)` at the logical end of a segment: a window shorter than
/// [`MIN_HEADER_SIZE`] or an all-zero header (unwritten tail).
pub fn decode_header(buf: &[u8]) -> Result<Option<RecordHeader>> {
    if buf.len() < MIN_HEADER_SIZE {
        return Ok(None);
    }

    let crc = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let kind = buf[4];

    let window = &buf[..buf.len().min(MAX_HEADER_SIZE)];
    if window.iter().all(|&b| b == 0) {
        return Ok(None);
    }

    let mut pos = MIN_HEADER_SIZE;
    let (key_size, n) = decode_length(&buf[pos..])?;
    pos += n;
    let (value_size, n) = decode_length(&buf[pos..])?;
    pos += n;

    if crc == 0 && key_size == 0 && value_size == 0 {
        return Ok(None);
    }

    Ok(Some(RecordHeader {
        crc,
        kind,
        key_size,
        value_size,
        header_size: pos,
    }))
}

fn decode_length(buf: &[u8]) -> Result<(u32, usize)> {
    let window = &buf[..buf.len().min(MAX_VARINT_LEN32)];
    let (len, n) = decode_varint(window)
        .ok_or_else(|| CaskError::Corruption("truncated length in record header".to_string()))?;
    let len = u32::try_from(len)
        .map_err(|_| CaskError::Corruption(format!("invalid length {} in record header", len)))?;
    Ok((len, n))
}

/// Decode one complete record from the start of `buf`.
///
/// Returns the record and its encoded length, or `Ok(None)` at end of data.
pub fn decode_record(buf: &[u8]) -> Result<Option<(Record, usize)>> {
    let header = match decode_header(buf)? {
        Some(header) => header,
        None => return Ok(None),
    };

    let total = header.record_size();
    if buf.len() < total {
        return Err(CaskError::Corruption(format!(
            "truncated record: expected {} bytes, got {}",
            total,
            buf.len()
        )));
    }

    let kv = buf[header.header_size..total].to_vec();
    let record = header.into_record(buf, kv)?;
    Ok(Some((record, total)))
}
