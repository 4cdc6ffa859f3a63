//! Key → file persistence with staged, atomically renamed writes.
//!
//! Layout under a cache root:
//!
//! ```text
//! <root>/<encoded key>                      complete entries
//! <root>/.staging/<encoded key>.<rand>.part  writes in progress
//! ```
//!
//! A file only appears under its final name through `rename`, so `has` is
//! either false or the file is byte-complete.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;
use crate::key;

pub(crate) const STAGING_DIR: &str = ".staging";

/// Durable key → blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    staging: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `root`.
    ///
    /// Several handles, in one process or many, may share a root. Staged
    /// files are left alone here since another handle may still be writing
    /// them; see [`sweep_stale`](Self::sweep_stale).
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        Ok(Self { root, staging })
    }

    /// Remove staged files untouched for at least `max_age`.
    ///
    /// Meant to run once at server start with `max_age` no shorter than the
    /// longest write a live handle can make. Returns the number removed.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.staging)? {
            let entry = entry?;
            let path = entry.path();
            // Another sweeper may have removed it already.
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            let age = modified.elapsed().unwrap_or_default();
            if age < max_age {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %path.display(), ?age, "removed stale staged file");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cannot remove stale staged file"),
            }
        }
        Ok(removed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic location of `key`'s complete entry.
    pub fn full_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(key::file_name(key)?))
    }

    /// True iff a complete entry exists for `key`.
    pub async fn has(&self, key: &str) -> bool {
        let Ok(path) = self.full_path(key) else {
            return false;
        };
        tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
    }

    /// Read a complete entry, `None` if absent.
    pub async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.full_path(key)?).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `data` as the entry for `key`, replacing any previous entry.
    pub async fn save(&self, key: &str, data: &[u8]) -> Result<PathBuf> {
        let mut staged = self.stage(key).await?;
        staged.write(data).await?;
        staged.commit().await
    }

    /// Begin a streamed write for `key`.
    ///
    /// Nothing is visible under the final path until
    /// [`StagedFile::commit`]; dropping the handle discards the bytes.
    pub async fn stage(&self, key: &str) -> Result<StagedFile> {
        let name = key::file_name(key)?;
        let target = self.root.join(&name);
        let staged = self
            .staging
            .join(format!("{name}.{:016x}.part", rand::random::<u64>()));
        let file = tokio::fs::File::create(&staged).await?;
        debug!(%key, staged = %staged.display(), "staging cache entry");
        Ok(StagedFile {
            file: Some(file),
            staged,
            target,
            written: 0,
            committed: false,
        })
    }
}

/// An in-progress cache write.
#[derive(Debug)]
pub struct StagedFile {
    file: Option<tokio::fs::File>,
    staged: PathBuf,
    target: PathBuf,
    written: u64,
    committed: bool,
}

impl StagedFile {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(chunk).await?;
            self.written += chunk.len() as u64;
        }
        Ok(())
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush, sync and atomically move the file into place.
    ///
    /// Readers that already opened a previous entry under the same key keep
    /// reading that file; new readers see the replacement.
    pub async fn commit(mut self) -> Result<PathBuf> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&self.staged, &self.target).await?;
        self.committed = true;
        debug!(path = %self.target.display(), bytes = self.written, "cache entry committed");
        Ok(self.target.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        drop(self.file.take());
        match fs::remove_file(&self.staged) {
            Ok(()) => debug!(path = %self.staged.display(), "discarded staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.staged.display(), error = %e, "cannot discard staged file"),
        }
    }
}
