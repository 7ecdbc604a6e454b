//! Engine recovery
//!
//! Rebuilds the index when a data directory is opened.
//!
//! ## Order
//! 1. Discover segments by file name, ascending id
//! 2. Load the hint file (locations of everything a merge kept)
//! 3. Replay segments at or above the merge boundary record by record
//! 4. Batch records are buffered per sequence number and applied only when
//!    their commit marker is reached

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::index::{new_indexer, Indexer};
use crate::io::IoKind;
use crate::layout;
use crate::record::key::{parse_key, NON_TXN_SEQ};
use crate::record::{RecordKind, RecordPos};
use crate::segment::{read_merge_boundary, Segment};

use super::{apply_to_index, DbState};

/// Result of replaying segments
#[derive(Debug, Default)]
struct ReplayStats {
    records: u64,
    reclaimable: u64,
    max_seq: u64,
    /// Batches that never reached a commit marker
    discarded_batches: usize,
}

/// Build engine state from the files in `config.data_dir`
pub(super) fn recover(config: &Config) -> Result<DbState> {
    let dir = &config.data_dir;

    let startup_kind = if config.mmap_at_startup {
        IoKind::Mmap
    } else {
        IoKind::File
    };

    let mut segments = Vec::new();
    for id in segment_ids(dir)? {
        segments.push(Segment::open(dir, id, startup_kind)?);
    }

    let mut index = new_indexer(config.index_kind);
    let hinted = load_hint(dir, index.as_mut())?;

    let boundary = if layout::merge_finished_path(dir).exists() {
        Some(read_merge_boundary(dir)?)
    } else {
        None
    };

    let stats = replay(&mut segments, boundary, index.as_mut())?;

    if stats.records > 0 || hinted > 0 {
        tracing::info!(
            "Recovered {}: {} hinted keys, {} replayed records, {} uncommitted batches discarded, last batch seq {}",
            dir.display(),
            hinted,
            stats.records,
            stats.discarded_batches,
            stats.max_seq
        );
    }

    if startup_kind == IoKind::Mmap {
        for segment in segments.iter_mut() {
            segment.set_backend(IoKind::File)?;
        }
    }

    let mut active = match segments.pop() {
        Some(segment) => segment,
        None => Segment::open(dir, 0, IoKind::File)?,
    };

    let trimmed = active.truncate_to_cursor()?;
    if trimmed > 0 {
        tracing::warn!(
            "Truncated {} unreadable trailing bytes from segment {}",
            trimmed,
            active.id()
        );
    }

    let immutables = segments
        .into_iter()
        .map(|segment| (segment.id(), Arc::new(segment)))
        .collect();

    Ok(DbState {
        active,
        immutables,
        index,
        txn_seq: stats.max_seq,
        reclaimable: stats.reclaimable,
        bytes_since_sync: 0,
    })
}

/// Segment ids present in `dir`, ascending
fn segment_ids(dir: &Path) -> Result<Vec<u32>> {
    let mut ids = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != layout::SEGMENT_SUFFIX) {
            continue;
        }

        let id = layout::parse_segment_id(&path).ok_or_else(|| {
            CaskError::DataDirectory(format!("unexpected segment file {}", path.display()))
        })?;
        ids.push(id);
    }

    ids.sort_unstable();
    Ok(ids)
}

/// Pre-populate `index` from the hint file, if one exists
fn load_hint(dir: &Path, index: &mut dyn Indexer) -> Result<usize> {
    if !layout::hint_path(dir).exists() {
        return Ok(0);
    }

    let hint = Segment::open_hint(dir)?;
    let mut offset = 0;
    let mut count = 0;

    while let Some((record, size)) = hint.read_record(offset)? {
        let pos = RecordPos::decode(&record.value)?;
        index.put(record.key, pos);
        offset += size;
        count += 1;
    }

    tracing::debug!("Loaded {} hint entries from {}", count, dir.display());
    Ok(count)
}

/// Replay every segment not covered by the hint file
fn replay(
    segments: &mut [Segment],
    boundary: Option<u32>,
    index: &mut dyn Indexer,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    let mut pending: HashMap<u64, Vec<(Vec<u8>, RecordKind, RecordPos)>> = HashMap::new();

    for segment in segments.iter_mut() {
        let id = segment.id();

        // Merged data is already in the index via the hint file
        if boundary.map_or(false, |b| id < b) {
            let size = segment.size()?;
            segment.set_write_cursor(size);
            continue;
        }

        let mut offset = 0;
        while let Some((record, size)) = segment.read_record(offset)? {
            let pos = RecordPos {
                segment_id: id,
                offset,
                size: size as u32,
            };
            let (key, seq) = parse_key(&record.key);

            if seq == NON_TXN_SEQ {
                apply_to_index(index, &mut stats.reclaimable, key.to_vec(), record.kind, pos);
            } else if record.kind == RecordKind::Commit {
                for (key, kind, pos) in pending.remove(&seq).unwrap_or_default() {
                    apply_to_index(index, &mut stats.reclaimable, key, kind, pos);
                }
            } else {
                pending
                    .entry(seq)
                    .or_default()
                    .push((key.to_vec(), record.kind, pos));
            }

            stats.max_seq = stats.max_seq.max(seq);
            stats.records += 1;
            offset += size;
        }

        segment.set_write_cursor(offset);
    }

    stats.discarded_batches = pending.len();
    Ok(stats)
}
