//! Tests for Engine recovery
//!
//! These tests verify:
//! - Reopen restores puts, overwrites and deletes
//! - Recovery across many segments, with and without mmap at startup
//! - Appends after reopen continue at the right offset
//! - Torn or zeroed tails are trimmed, corrupted records fail the open

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use caskdb::layout;
use caskdb::record::encode_record;
use caskdb::record::key::{encode_key, NON_TXN_SEQ};
use caskdb::record::Record;
use caskdb::{CaskError, Config, Engine};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(dir: &Path, mmap: bool) -> Config {
    Config::builder()
        .data_dir(dir)
        .segment_size(1024)
        .mmap_at_startup(mmap)
        .build()
}

fn key(i: usize) -> Vec<u8> {
    format!("key{:04}", i).into_bytes()
}

fn value(i: usize) -> Vec<u8> {
    format!("value{:04}", i).into_bytes()
}

fn fill(engine: &Engine, count: usize) {
    for i in 0..count {
        engine.put(&key(i), &value(i)).unwrap();
    }
}

fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

// =============================================================================
// Reopen Tests
// =============================================================================

#[test]
fn test_reopen_empty() {
    let temp = TempDir::new().unwrap();
    Engine::open(config(temp.path(), true)).unwrap().close().unwrap();

    let engine = Engine::open(config(temp.path(), true)).unwrap();
    assert_eq!(engine.key_count(), 0);
    assert_eq!(engine.active_segment_id(), 0);
    assert_eq!(engine.active_write_cursor(), 0);
}

#[test]
fn test_reopen_restores_data() {
    for mmap in [true, false] {
        let temp = TempDir::new().unwrap();
        {
            let engine = Engine::open(config(temp.path(), mmap)).unwrap();
            fill(&engine, 200);
            engine.close().unwrap();
        }

        let engine = Engine::open(config(temp.path(), mmap)).unwrap();
        assert_eq!(engine.key_count(), 200);
        assert!(engine.immutable_segment_count() > 0);
        for i in 0..200 {
            assert_eq!(engine.get(&key(i)).unwrap(), value(i));
        }
    }
}

#[test]
fn test_reopen_restores_overwrites_and_deletes() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 100);
        for i in 0..50 {
            engine.put(&key(i), b"updated").unwrap();
        }
        for i in 50..75 {
            engine.delete(&key(i)).unwrap();
        }
        engine.close().unwrap();
    }

    let engine = Engine::open(config(temp.path(), true)).unwrap();
    assert_eq!(engine.key_count(), 75);
    assert_eq!(engine.get(&key(0)).unwrap(), b"updated");
    assert!(matches!(engine.get(&key(60)), Err(CaskError::KeyNotFound)));
    assert_eq!(engine.get(&key(99)).unwrap(), value(99));
}

#[test]
fn test_reopen_is_idempotent() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 100);
        engine.delete(&key(3)).unwrap();
        engine.close().unwrap();
    }

    let mut snapshots = Vec::new();
    for _ in 0..3 {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        let mut pairs = Vec::new();
        engine
            .fold(|k, v| {
                pairs.push((k.to_vec(), v.to_vec()));
                true
            })
            .unwrap();
        snapshots.push((pairs, engine.reclaimable_bytes(), engine.active_write_cursor()));
        engine.close().unwrap();
    }

    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(snapshots[1], snapshots[2]);
}

#[test]
fn test_reclaimable_restored() {
    let temp = TempDir::new().unwrap();
    let expected = {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 20);
        for i in 0..10 {
            engine.put(&key(i), b"again").unwrap();
        }
        engine.delete(&key(15)).unwrap();
        let reclaimable = engine.reclaimable_bytes();
        engine.close().unwrap();
        reclaimable
    };

    let engine = Engine::open(config(temp.path(), true)).unwrap();
    assert_eq!(engine.reclaimable_bytes(), expected);
}

#[test]
fn test_writes_after_reopen() {
    let temp = TempDir::new().unwrap();
    let (active, cursor) = {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 30);
        let position = (engine.active_segment_id(), engine.active_write_cursor());
        engine.close().unwrap();
        position
    };

    {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        assert_eq!(engine.active_segment_id(), active);
        assert_eq!(engine.active_write_cursor(), cursor);

        engine.put(b"new", b"entry").unwrap();
        engine.put(&key(0), b"changed").unwrap();
        assert_eq!(engine.get(b"new").unwrap(), b"entry");
        engine.close().unwrap();
    }

    let engine = Engine::open(config(temp.path(), false)).unwrap();
    assert_eq!(engine.get(b"new").unwrap(), b"entry");
    assert_eq!(engine.get(&key(0)).unwrap(), b"changed");
    assert_eq!(engine.get(&key(29)).unwrap(), value(29));
}

#[test]
fn test_rotation_continues_after_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 100);
        engine.close().unwrap();
    }

    let engine = Engine::open(config(temp.path(), true)).unwrap();
    let before = engine.active_segment_id();
    for i in 100..300 {
        engine.put(&key(i), &value(i)).unwrap();
    }

    assert!(engine.active_segment_id() > before);
    for i in 0..300 {
        assert_eq!(engine.get(&key(i)).unwrap(), value(i));
    }
}

#[test]
fn test_drop_without_close() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 10);
    }

    let engine = Engine::open(config(temp.path(), true)).unwrap();
    assert_eq!(engine.key_count(), 10);
}

// =============================================================================
// Damaged Tail Tests
// =============================================================================

#[test]
fn test_short_garbage_tail_trimmed() {
    let temp = TempDir::new().unwrap();
    let active = {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 5);
        let active = engine.active_segment_id();
        engine.close().unwrap();
        active
    };
    let path = layout::segment_path(temp.path(), active);
    let clean_len = std::fs::metadata(&path).unwrap().len();
    append_raw(&path, &[0xDE, 0xAD, 0xBE]);

    {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        assert_eq!(engine.key_count(), 5);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);

        engine.put(b"after", b"tail").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(config(temp.path(), true)).unwrap();
    assert_eq!(engine.get(b"after").unwrap(), b"tail");
    assert_eq!(engine.key_count(), 6);
}

#[test]
fn test_zeroed_tail_trimmed() {
    let temp = TempDir::new().unwrap();
    let active = {
        let engine = Engine::open(config(temp.path(), false)).unwrap();
        fill(&engine, 5);
        let active = engine.active_segment_id();
        engine.close().unwrap();
        active
    };
    append_raw(&layout::segment_path(temp.path(), active), &[0u8; 40]);

    {
        let engine = Engine::open(config(temp.path(), false)).unwrap();
        assert_eq!(engine.key_count(), 5);
        engine.put(b"after", b"zeros").unwrap();
        engine.close().unwrap();
    }

    let engine = Engine::open(config(temp.path(), false)).unwrap();
    assert_eq!(engine.get(b"after").unwrap(), b"zeros");
    assert_eq!(engine.get(&key(4)).unwrap(), value(4));
}

#[test]
fn test_corrupted_record_fails_open() {
    let temp = TempDir::new().unwrap();
    {
        let engine = Engine::open(config(temp.path(), true)).unwrap();
        fill(&engine, 5);
        engine.close().unwrap();
    }

    // Last byte of the second record's value
    let record_size =
        encode_record(&Record::normal(encode_key(&key(0), NON_TXN_SEQ), value(0))).len();
    let path = layout::segment_path(temp.path(), 0);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[2 * record_size - 1] ^= 0x55;
    std::fs::write(&path, &bytes).unwrap();

    for mmap in [true, false] {
        let result = Engine::open(config(temp.path(), mmap));
        assert!(matches!(result, Err(CaskError::CrcMismatch)));
    }
}

#[test]
fn test_unexpected_segment_name_fails_open() {
    let temp = TempDir::new().unwrap();
    Engine::open(config(temp.path(), true)).unwrap().close().unwrap();

    std::fs::write(temp.path().join("garbage.data"), b"").unwrap();

    let result = Engine::open(config(temp.path(), true));
    assert!(matches!(result, Err(CaskError::DataDirectory(_))));
}
