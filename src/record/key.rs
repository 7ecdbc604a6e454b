//! Transaction key codec
//!
//! Every key written to a segment is prefixed with the uvarint sequence
//! number of the batch it belongs to.
//!
//! ```text
//! ┌──────────────────┬──────────────┐
//! │ SeqNo (uvarint)  │   User Key   │
//! └──────────────────┴──────────────┘
//! ```

use super::codec::{decode_uvarint, encode_uvarint};

/// Sequence number of writes outside any batch
pub const NON_TXN_SEQ: u64 = 0;

/// User key carried by batch commit markers
pub const TXN_FIN_KEY: &[u8] = b"txn-fin";

/// Prefix `key` with `seq`
pub fn encode_key(key: &[u8], seq: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(key.len() + 10);
    encode_uvarint(seq, &mut buf);
    buf.extend_from_slice(key);
    buf
}

/// Split a stored key into (user key, sequence number).
///
/// A key whose prefix cannot be decoded is returned whole with sequence 0.
pub fn parse_key(key: &[u8]) -> (&[u8], u64) {
    match decode_uvarint(key) {
        Some((seq, n)) => (&key[n..], seq),
        None => (key, NON_TXN_SEQ),
    }
}
