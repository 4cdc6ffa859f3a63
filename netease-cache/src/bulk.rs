//! Whole-cache size accounting and clearing.
//!
//! The staging directory is filtered out of the walk, so writes in progress
//! are neither counted nor removed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::Result;
use crate::store::{DiskCache, STAGING_DIR};

/// Number and total size of complete entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub files: u64,
    pub bytes: u64,
}

/// Outcome of [`DiskCache::clear`].
///
/// Individual failures do not stop the walk; they are collected in `errors`.
#[derive(Debug, Default)]
pub struct ClearReport {
    pub removed: u64,
    pub bytes_freed: u64,
    pub errors: Vec<(PathBuf, io::Error)>,
}

impl ClearReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl DiskCache {
    /// Count complete entries and their total size.
    pub fn usage(&self) -> Result<CacheUsage> {
        let mut usage = CacheUsage::default();
        for entry in self.walk() {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_dir() {
                continue;
            }
            usage.files += 1;
            usage.bytes += entry.metadata().map_err(io::Error::from)?.len();
        }
        Ok(usage)
    }

    /// Remove every complete entry, leaving in-flight staged writes alone.
    ///
    /// Subdirectories are removed once their contents are gone.
    pub fn clear(&self) -> ClearReport {
        let mut report = ClearReport::default();
        for entry in self.walk() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(self.root()).to_path_buf();
                    report.errors.push((path, e.into()));
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_dir() {
                if let Err(e) = fs::remove_dir(path) {
                    warn!(path = %path.display(), error = %e, "cannot remove cache subdirectory");
                }
                continue;
            }
            let len = entry.metadata().map_or(0, |m| m.len());
            match fs::remove_file(path) {
                Ok(()) => {
                    report.removed += 1;
                    report.bytes_freed += len;
                }
                Err(e) => report.errors.push((path.to_path_buf(), e)),
            }
        }

        info!(
            root = %self.root().display(),
            removed = report.removed,
            bytes = report.bytes_freed,
            errors = report.errors.len(),
            "cache cleared"
        );
        report
    }

    /// Everything under the root except the staging directory, children
    /// before their parent.
    fn walk(&self) -> impl Iterator<Item = walkdir::Result<DirEntry>> + '_ {
        let root = self.root();
        WalkDir::new(root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_entry(move |e| !is_staging(root, e.path()))
    }
}

fn is_staging(root: &Path, path: &Path) -> bool {
    path.parent() == Some(root) && path.file_name().is_some_and(|n| n == STAGING_DIR)
}
