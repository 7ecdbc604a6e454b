//! Tests for the record codec
//!
//! These tests verify:
//! - Encode/decode of normal, tombstone and commit records
//! - Exact encoded sizes (header varints included)
//! - CRC detection of single-bit corruption
//! - End-of-data detection (short window, zeroed tail)
//! - Varint, transaction key and record position helpers

use caskdb::record::key::{encode_key, parse_key, NON_TXN_SEQ, TXN_FIN_KEY};
use caskdb::record::{
    decode_header, decode_record, decode_uvarint, decode_varint, encode_record, encode_uvarint,
    encode_varint, Record, RecordKind, RecordPos, MAX_HEADER_SIZE, MIN_HEADER_SIZE,
};
use caskdb::CaskError;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_record() -> Record {
    Record::normal(b"key".to_vec(), b"value".to_vec())
}

/// Offset of the first key byte for records with short keys and values
fn short_header_size() -> usize {
    MIN_HEADER_SIZE + 2
}

// =============================================================================
// Encode / Decode Tests
// =============================================================================

#[test]
fn test_encode_decode_normal_record() {
    let record = sample_record();
    let encoded = encode_record(&record);

    let (decoded, size) = decode_record(&encoded).unwrap().unwrap();

    assert_eq!(decoded, record);
    assert_eq!(size, encoded.len());
}

#[test]
fn test_encode_decode_tombstone() {
    let record = Record::tombstone(b"gone".to_vec());
    let encoded = encode_record(&record);

    let (decoded, _) = decode_record(&encoded).unwrap().unwrap();

    assert_eq!(decoded.kind, RecordKind::Tombstone);
    assert_eq!(decoded.key, b"gone");
    assert!(decoded.value.is_empty());
}

#[test]
fn test_encode_decode_commit_marker() {
    let record = Record {
        key: encode_key(TXN_FIN_KEY, 9),
        value: Vec::new(),
        kind: RecordKind::Commit,
    };
    let encoded = encode_record(&record);

    let (decoded, _) = decode_record(&encoded).unwrap().unwrap();

    assert_eq!(decoded.kind, RecordKind::Commit);
    assert_eq!(parse_key(&decoded.key), (TXN_FIN_KEY, 9));
}

#[test]
fn test_encoded_size_short_lengths() {
    let encoded = encode_record(&sample_record());

    // crc(4) + kind(1) + key_len(1) + value_len(1) + "key" + "value"
    assert_eq!(encoded.len(), 4 + 1 + 1 + 1 + 3 + 5);
}

#[test]
fn test_encoded_size_multibyte_value_length() {
    let record = Record::normal(b"k".to_vec(), vec![0xAB; 1000]);
    let encoded = encode_record(&record);

    let header = decode_header(&encoded).unwrap().unwrap();

    // zigzag(1000) = 2000 needs two varint bytes
    assert_eq!(header.header_size, 4 + 1 + 1 + 2);
    assert_eq!(header.key_size, 1);
    assert_eq!(header.value_size, 1000);
    assert_eq!(header.record_size(), encoded.len());
}

#[test]
fn test_empty_key_and_value_still_decodes() {
    let record = Record::normal(Vec::new(), Vec::new());
    let encoded = encode_record(&record);

    let header = decode_header(&encoded).unwrap().unwrap();
    assert_ne!(header.crc, 0);

    let (decoded, size) = decode_record(&encoded).unwrap().unwrap();
    assert_eq!(decoded, record);
    assert_eq!(size, MIN_HEADER_SIZE + 2);
}

#[test]
fn test_decode_record_followed_by_more_data() {
    let first = encode_record(&sample_record());
    let second = encode_record(&Record::normal(b"other".to_vec(), b"x".to_vec()));

    let mut buf = first.to_vec();
    buf.extend_from_slice(&second);

    let (decoded, size) = decode_record(&buf).unwrap().unwrap();
    assert_eq!(decoded, sample_record());
    assert_eq!(size, first.len());

    let (next, _) = decode_record(&buf[size..]).unwrap().unwrap();
    assert_eq!(next.key, b"other");
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_single_bit_flip_detected() {
    let encoded = encode_record(&sample_record());
    let header_size = short_header_size();

    // CRC, kind byte and payload; length bytes change framing and are covered below
    let positions = (0..5).chain(header_size..encoded.len());

    for byte in positions {
        for bit in 0..8 {
            let mut corrupted = encoded.to_vec();
            corrupted[byte] ^= 1 << bit;

            let result = decode_record(&corrupted);
            assert!(
                result.is_err(),
                "flip of bit {} in byte {} went undetected",
                bit,
                byte
            );
        }
    }
}

#[test]
fn test_payload_flip_is_crc_mismatch() {
    let mut encoded = encode_record(&sample_record()).to_vec();
    let last = encoded.len() - 1;
    encoded[last] ^= 0x01;

    assert!(matches!(decode_record(&encoded), Err(CaskError::CrcMismatch)));
}

#[test]
fn test_length_corruption_detected() {
    let mut encoded = encode_record(&sample_record()).to_vec();
    // value length 5 (zigzag 10) becomes 60 (zigzag 120), past the buffer
    encoded[6] = 120;

    assert!(decode_record(&encoded).is_err());
}

#[test]
fn test_truncated_record_is_error() {
    let encoded = encode_record(&sample_record());
    let truncated = &encoded[..encoded.len() - 2];

    assert!(matches!(
        decode_record(truncated),
        Err(CaskError::Corruption(_))
    ));
}

#[test]
fn test_unknown_kind_is_rejected() {
    assert!(RecordKind::try_from(3).is_err());
    assert_eq!(RecordKind::try_from(2).unwrap(), RecordKind::Commit);
}

// =============================================================================
// End Of Data Tests
// =============================================================================

#[test]
fn test_short_window_is_end_of_data() {
    let encoded = encode_record(&sample_record());

    assert!(decode_header(&encoded[..MIN_HEADER_SIZE - 1]).unwrap().is_none());
    assert!(decode_header(&[]).unwrap().is_none());
    assert!(decode_record(&[0xFF, 0xFF, 0xFF]).unwrap().is_none());
}

#[test]
fn test_zeroed_header_is_end_of_data() {
    assert!(decode_header(&[0u8; MAX_HEADER_SIZE]).unwrap().is_none());
    assert!(decode_header(&[0u8; MIN_HEADER_SIZE]).unwrap().is_none());
    assert!(decode_record(&[0u8; 64]).unwrap().is_none());
}

// =============================================================================
// Varint Tests
// =============================================================================

#[test]
fn test_uvarint_encoding() {
    let mut buf = Vec::new();
    encode_uvarint(300, &mut buf);
    assert_eq!(buf, vec![0xAC, 0x02]);

    assert_eq!(decode_uvarint(&buf), Some((300, 2)));
}

#[test]
fn test_uvarint_incomplete() {
    assert_eq!(decode_uvarint(&[0x80]), None);
    assert_eq!(decode_uvarint(&[]), None);
}

#[test]
fn test_uvarint_max() {
    let mut buf = Vec::new();
    encode_uvarint(u64::MAX, &mut buf);

    assert_eq!(buf.len(), 10);
    assert_eq!(decode_uvarint(&buf), Some((u64::MAX, 10)));
}

#[test]
fn test_zigzag_varint() {
    for (value, expected) in [(0i64, 0u8), (-1, 1), (1, 2), (-2, 3), (2, 4)] {
        let mut buf = Vec::new();
        encode_varint(value, &mut buf);
        assert_eq!(buf, vec![expected]);
        assert_eq!(decode_varint(&buf), Some((value, 1)));
    }
}

// =============================================================================
// Transaction Key Tests
// =============================================================================

#[test]
fn test_non_transactional_key_prefix() {
    let encoded = encode_key(b"user", NON_TXN_SEQ);

    assert_eq!(encoded, b"\x00user");
    assert_eq!(parse_key(&encoded), (&b"user"[..], NON_TXN_SEQ));
}

#[test]
fn test_transactional_key_prefix() {
    let encoded = encode_key(b"user", 300);

    assert_eq!(&encoded[..2], &[0xAC, 0x02]);
    assert_eq!(parse_key(&encoded), (&b"user"[..], 300));
}

#[test]
fn test_parse_key_without_user_part() {
    let encoded = encode_key(b"", 5);
    assert_eq!(parse_key(&encoded), (&b""[..], 5));
}

// =============================================================================
// Record Position Tests
// =============================================================================

#[test]
fn test_record_pos_encode_decode() {
    let pos = RecordPos {
        segment_id: 42,
        offset: 1 << 33,
        size: 70_000,
    };

    let decoded = RecordPos::decode(&pos.encode()).unwrap();
    assert_eq!(decoded, pos);
}

#[test]
fn test_record_pos_malformed() {
    assert!(RecordPos::decode(&[]).is_err());
    assert!(RecordPos::decode(&[0x01, 0x80]).is_err());
}
