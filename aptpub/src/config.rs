//! Configuration for the publishing engine.
//!
//! One [`PublisherConfig`] value is constructed at process start (usually
//! from a JSON file) and passed by reference into every component; there is
//! no process-wide configuration singleton.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PublishError, PublishResult};

/// Name of the staging directory placed next to a repository's `dists`
/// tree while a publish cycle is in progress. Sorts after `dists` so
/// directory listings keep the live tree first.
pub const STAGING_DIR_NAME: &str = "zzz-meta";

/// Settings for the publishing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Root directory holding one subdirectory per repository.
    pub archive_root_dir: PathBuf,
    /// Directory containing external data-import hook executables.
    pub data_import_hooks_dir: PathBuf,
    /// Scratch directory for fetched supplemental metadata.
    pub cache_dir: PathBuf,
    /// Directory for per-repository publish lock files.
    pub lock_dir: PathBuf,
    /// GnuPG home directory holding the archive's secret signing keys.
    pub secret_gpg_home_dir: PathBuf,
    /// Optional executable used to validate fetched supplemental metadata.
    #[serde(default)]
    pub dep11_validator: Option<PathBuf>,
}

impl PublisherConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> PublishResult<Self> {
        let file = File::open(path).map_err(|e| {
            PublishError::Configuration(format!(
                "cannot open config file {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            PublishError::Configuration(format!(
                "cannot parse config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Published `dists` tree of a repository.
    pub fn repo_dists_dir(&self, repo_name: &str) -> PathBuf {
        self.archive_root_dir.join(repo_name).join("dists")
    }

    /// In-progress staging tree of a repository.
    pub fn repo_staging_dir(&self, repo_name: &str) -> PathBuf {
        self.archive_root_dir.join(repo_name).join(STAGING_DIR_NAME)
    }
}
