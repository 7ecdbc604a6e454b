//! Filesystem helpers
//!
//! Directory sizing, free-space queries and directory copies used by merge,
//! stat and backup.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Total size of all regular files under `dir` (recursive)
pub fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Bytes available to unprivileged users on the filesystem holding `dir`
pub fn available_space(dir: &Path) -> Result<u64> {
    Ok(fs2::available_space(dir)?)
}

/// Recursively copy `src` into `dest`, skipping entries named in `exclude`
pub fn copy_dir(src: &Path, dest: &Path, exclude: &[&str]) -> Result<()> {
    fs::create_dir_all(dest)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if exclude.iter().any(|ex| name == *ex) {
            continue;
        }

        let from = entry.path();
        let to = dest.join(&name);
        if entry.file_type()?.is_dir() {
            copy_dir(&from, &to, exclude)?;
        } else {
            fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
