//! Per-repository publish locking.
//!
//! Publishing one repository is serialized process-wide through an exclusive
//! advisory file lock keyed by repository name. Distinct repositories may
//! publish fully in parallel. Acquisition never blocks: a held lock surfaces
//! as [`PublishError::LockContention`] so schedulers skip and retry later.

use std::fs::{self, File, OpenOptions};
use std::path::Path;

use fs2::FileExt;
use tracing::debug;

use crate::error::{PublishError, PublishResult};

/// An exclusive lock on one repository's publish cycle.
///
/// Released automatically on drop.
pub struct RepoLock {
    file: File,
    repo_name: String,
}

impl RepoLock {
    /// Acquire the lock for a repository, failing fast when another cycle
    /// already holds it.
    pub fn acquire(lock_dir: &Path, repo_name: &str) -> PublishResult<Self> {
        fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("publish_{}.lock", repo_name));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive().map_err(|e| {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                PublishError::LockContention(repo_name.to_string())
            } else {
                PublishError::Io(e)
            }
        })?;

        debug!("Acquired publish lock for repository {}", repo_name);
        Ok(Self {
            file,
            repo_name: repo_name.to_string(),
        })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(
                "Failed to release publish lock for {}: {}",
                self.repo_name, e
            );
        }
    }
}
