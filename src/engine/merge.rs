//! Merge / compaction
//!
//! Rewrites the live records of all sealed segments into a sibling
//! `{data_dir}-MERGE` directory together with a hint file, and swaps the
//! result in the next time the directory is opened.
//!
//! ## Protocol
//! 1. Under the write lock: check preconditions, seal the active segment and
//!    snapshot the sealed set. The new active id is the *boundary*.
//! 2. Without the lock: copy every record the index still points at into a
//!    fresh engine in the merge directory, writing a hint entry for each.
//! 3. Sync, then write the merge-finished marker holding the boundary id.
//! 4. On open, [`reconcile`] replaces segments below the boundary with the
//!    merge output. A merge directory without a marker is discarded.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{CaskError, Result};
use crate::fs_util;
use crate::layout;
use crate::record::encode_record;
use crate::record::key::{encode_key, parse_key, NON_TXN_SEQ};
use crate::record::{Record, RecordPos};
use crate::segment::{read_merge_boundary, Segment};

use super::Engine;

/// Key of the record stored in the merge-finished marker
const MERGE_FINISHED_KEY: &[u8] = b"MERGE.FINISHED";

/// Clears the merging flag when the merge ends, however it ends
struct MergeGuard<'a>(&'a AtomicBool);

impl Drop for MergeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Engine {
    /// Compact sealed segments into the merge directory.
    ///
    /// Fails without side effects if a merge is already running, the
    /// reclaimable ratio is below `merge_ratio`, or the disk cannot hold a
    /// copy of the live data. The result takes effect on the next open.
    pub fn merge(&self) -> Result<()> {
        let mut state = self.state.write();

        if state.immutables.is_empty() && state.active.write_cursor() == 0 {
            return Ok(());
        }
        if self.merging.load(Ordering::SeqCst) {
            return Err(CaskError::MergeInProgress);
        }

        let total = fs_util::dir_size(&self.config.data_dir)?;
        let ratio = if total == 0 {
            0.0
        } else {
            state.reclaimable as f32 / total as f32
        };
        if ratio < self.config.merge_ratio {
            return Err(CaskError::MergeRatioNotReached {
                ratio,
                threshold: self.config.merge_ratio,
            });
        }

        let required = total.saturating_sub(state.reclaimable);
        let available = fs_util::available_space(&self.config.data_dir)?;
        if required >= available {
            return Err(CaskError::InsufficientDiskSpace {
                required,
                available,
            });
        }

        self.merging.store(true, Ordering::SeqCst);
        let _guard = MergeGuard(&self.merging);

        state.rotate(&self.config)?;
        let boundary = state.active.id();
        let candidates: Vec<Arc<Segment>> = state.immutables.values().cloned().collect();
        drop(state);

        tracing::info!(
            "Merging {} segments below boundary {} (reclaimable ratio {:.3})",
            candidates.len(),
            boundary,
            ratio
        );

        let merge_dir = layout::merge_dir(&self.config.data_dir);
        if merge_dir.exists() {
            fs::remove_dir_all(&merge_dir)?;
        }
        fs::create_dir_all(&merge_dir)?;

        let mut merge_config = self.config.clone();
        merge_config.data_dir = merge_dir.clone();
        merge_config.sync_writes = false;
        merge_config.mmap_at_startup = false;

        let merge_engine = Engine::open(merge_config)?;
        let mut hint = Segment::open_hint(&merge_dir)?;
        let mut kept = 0u64;

        {
            let mut merge_state = merge_engine.state.write();

            for segment in &candidates {
                let mut offset = 0;
                while let Some((record, size)) = segment.read_record(offset)? {
                    let (key, _) = parse_key(&record.key);

                    if self.is_live(key, segment.id(), offset) {
                        let rewritten = Record {
                            key: encode_key(key, NON_TXN_SEQ),
                            value: record.value,
                            kind: record.kind,
                        };
                        let pos = merge_state.append(&merge_engine.config, &rewritten)?;
                        hint.write_hint(key, &pos)?;
                        kept += 1;
                    }

                    offset += size;
                }
            }

            hint.sync()?;
            merge_state.active.sync()?;
        }
        merge_engine.close()?;

        let mut marker = Segment::open_merge_finished(&merge_dir)?;
        let record = Record::normal(
            MERGE_FINISHED_KEY.to_vec(),
            boundary.to_string().into_bytes(),
        );
        marker.write(&encode_record(&record))?;
        marker.sync()?;

        tracing::info!(
            "Merge finished: {} live records written to {}",
            kept,
            merge_dir.display()
        );
        Ok(())
    }

    /// Whether the index still points at this exact record
    fn is_live(&self, key: &[u8], segment_id: u32, offset: u64) -> bool {
        self.state
            .read()
            .index
            .get(key)
            .map_or(false, |pos: RecordPos| {
                pos.segment_id == segment_id && pos.offset == offset
            })
    }
}

/// Apply or discard a merge left in `{dir}-MERGE`.
///
/// Merge output holds segments `0..=m`. Originals between `m` and the
/// boundary are removed, the rest are overwritten by rename in ascending
/// order, and the marker moves last so an interrupted reconcile can run
/// again. A rerun that still finds merged segments sees the same `m`; one
/// that finds none has already removed the originals.
pub(super) fn reconcile(dir: &Path) -> Result<()> {
    let merge_dir = layout::merge_dir(dir);
    if !merge_dir.is_dir() {
        return Ok(());
    }

    if !layout::merge_finished_path(&merge_dir).exists() {
        tracing::warn!("Discarding incomplete merge in {}", merge_dir.display());
        fs::remove_dir_all(&merge_dir)?;
        return Ok(());
    }

    let boundary = read_merge_boundary(&merge_dir)?;

    let mut merged_ids = Vec::new();
    for entry in fs::read_dir(&merge_dir)? {
        if let Some(id) = layout::parse_segment_id(&entry?.path()) {
            merged_ids.push(id);
        }
    }
    merged_ids.sort_unstable();

    match merged_ids.last().copied() {
        Some(highest) if highest >= boundary => {
            return Err(CaskError::DataDirectory(format!(
                "merge output segment {} overlaps boundary {}",
                highest, boundary
            )));
        }
        Some(highest) => {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if let Some(id) = layout::parse_segment_id(&path) {
                    if id > highest && id < boundary {
                        fs::remove_file(&path)?;
                    }
                }
            }
        }
        None => tracing::warn!(
            "Resuming merge reconcile in {}: segments already moved",
            dir.display()
        ),
    }

    for id in &merged_ids {
        fs::rename(
            layout::segment_path(&merge_dir, *id),
            layout::segment_path(dir, *id),
        )?;
    }

    let hint = layout::hint_path(&merge_dir);
    if hint.exists() {
        fs::rename(&hint, layout::hint_path(dir))?;
    }
    fs::rename(
        layout::merge_finished_path(&merge_dir),
        layout::merge_finished_path(dir),
    )?;

    fs::remove_dir_all(&merge_dir)?;

    tracing::info!(
        "Applied merge into {}: {} segments, boundary {}",
        dir.display(),
        merged_ids.len(),
        boundary
    );
    Ok(())
}
