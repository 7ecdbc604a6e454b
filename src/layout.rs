//! On-disk layout
//!
//! Every file name the engine reads or writes is derived here.
//!
//! ```text
//! {data_dir}/
//!   ├── 000000000.data      segment 0
//!   ├── 000000001.data      segment 1 ...
//!   ├── hint-index          key → location map written by merge
//!   ├── merge-finished      merge boundary marker
//!   └── flock               advisory process lock
//! {data_dir}-MERGE/         transient merge output
//! ```

use std::path::{Path, PathBuf};

/// Segment file extension
pub const SEGMENT_SUFFIX: &str = "data";

/// Hint file name
pub const HINT_FILE: &str = "hint-index";

/// Merge-finished marker file name
pub const MERGE_FINISHED_FILE: &str = "merge-finished";

/// Lock sentinel file name
pub const LOCK_FILE: &str = "flock";

/// Suffix appended to the data directory name for merge output
pub const MERGE_DIR_SUFFIX: &str = "-MERGE";

/// Path of the segment with the given id
/// (7 → "{dir}/000000007.data")
pub fn segment_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(format!("{:09}.{}", id, SEGMENT_SUFFIX))
}

/// Parse a segment id from a file name
/// "000000042.data" → Some(42)
pub fn parse_segment_id(path: &Path) -> Option<u32> {
    if path.extension()? != SEGMENT_SUFFIX {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

pub fn hint_path(dir: &Path) -> PathBuf {
    dir.join(HINT_FILE)
}

pub fn merge_finished_path(dir: &Path) -> PathBuf {
    dir.join(MERGE_FINISHED_FILE)
}

pub fn lock_path(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE)
}

/// Sibling directory used while merging `dir`
pub fn merge_dir(dir: &Path) -> PathBuf {
    match dir.file_name() {
        Some(name) => {
            let mut merged = name.to_os_string();
            merged.push(MERGE_DIR_SUFFIX);
            dir.with_file_name(merged)
        }
        None => dir.join(MERGE_DIR_SUFFIX.trim_start_matches('-')),
    }
}
