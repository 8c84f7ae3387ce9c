//! Supplemental AppStream/DEP-11 metadata import.
//!
//! An external hook program fetches application-catalog data for a
//! repository into a scratch directory; the result is validated and later
//! folded into the staged suite tree. The fetch runs as a concurrent task so
//! its network latency overlaps with staging and index generation; the
//! publisher joins the task before merging the data.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use apt_meta::{import_metadata_file, Compression, MetadataFileRecord};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::ArchiveArchitecture;
use crate::config::PublisherConfig;
use crate::error::{PublishError, PublishResult};

/// Name of the hook executable looked up in the data-import hooks directory.
pub const FETCH_HOOK_NAME: &str = "fetch-appstream.sh";

/// Outcome of validating a directory of supplemental metadata.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Whether the data may be used.
    pub ok: bool,
    /// Human-readable issues when not ok.
    pub issues: Vec<String>,
}

impl ValidationReport {
    /// A passing report.
    pub fn passed() -> Self {
        Self {
            ok: true,
            issues: Vec::new(),
        }
    }
}

/// Validates fetched supplemental metadata before it enters the archive.
#[async_trait]
pub trait SupplementValidator: Send + Sync {
    /// Inspect the given directory and report whether its contents are
    /// acceptable.
    async fn validate(&self, dir: &Path) -> PublishResult<ValidationReport>;
}

/// Validator that accepts everything; used when no validator is configured.
pub struct AcceptingValidator;

#[async_trait]
impl SupplementValidator for AcceptingValidator {
    async fn validate(&self, _dir: &Path) -> PublishResult<ValidationReport> {
        Ok(ValidationReport::passed())
    }
}

/// Validator backed by an external executable.
///
/// The program is invoked with the directory as its only argument; exit
/// status zero means acceptable, anything else turns the captured output
/// into the issue list.
pub struct HookValidator {
    program: PathBuf,
}

impl HookValidator {
    /// Create a validator running the given executable.
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

#[async_trait]
impl SupplementValidator for HookValidator {
    async fn validate(&self, dir: &Path) -> PublishResult<ValidationReport> {
        let output = Command::new(&self.program)
            .arg(dir)
            .output()
            .await
            .map_err(|e| {
                PublishError::Hook(format!(
                    "cannot run validator {}: {}",
                    self.program.display(),
                    e
                ))
            })?;
        if output.status.success() {
            return Ok(ValidationReport::passed());
        }
        let issues = output
            .stdout
            .split(|b| *b == b'\n')
            .chain(output.stderr.split(|b| *b == b'\n'))
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect();
        Ok(ValidationReport { ok: false, issues })
    }
}

/// Fetch supplemental metadata for a repository via the external hook.
///
/// A missing hook program or an empty result directory is not an error and
/// yields `Ok(None)`. A non-zero hook exit or failed validation is a hard
/// failure that aborts the whole publish cycle.
pub async fn retrieve_dep11_data(
    config: &PublisherConfig,
    validator: &dyn SupplementValidator,
    repo_name: &str,
) -> PublishResult<Option<PathBuf>> {
    let hook_script = config.data_import_hooks_dir.join(FETCH_HOOK_NAME);
    if !hook_script.is_file() {
        info!(
            "Will not fetch DEP-11 data for {}: No hook script {}",
            repo_name,
            hook_script.display()
        );
        return Ok(None);
    }

    let target_dir = config.cache_dir.join(format!("import_dep11-{}", repo_name));
    if target_dir.is_dir() {
        fs::remove_dir_all(&target_dir)?;
    }
    fs::create_dir_all(&target_dir)?;

    let output = Command::new(&hook_script)
        .current_dir(&target_dir)
        .env("APTPUB_DATA_TARGET_DIR", &target_dir)
        .env("APTPUB_REPO_NAME", repo_name)
        .output()
        .await
        .map_err(|e| {
            PublishError::Hook(format!("cannot run {}: {}", hook_script.display(), e))
        })?;
    if !output.status.success() {
        return Err(PublishError::Hook(format!(
            "hook script {} failed: {}{}",
            hook_script.display(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    if fs::read_dir(&target_dir)?.next().is_none() {
        debug!("No DEP-11 data received for repository {}", repo_name);
        return Ok(None);
    }

    info!("Validating received DEP-11 metadata for {}", repo_name);
    let report = validator.validate(&target_dir).await?;
    if !report.ok {
        return Err(PublishError::Validation(report.issues));
    }

    Ok(Some(target_dir))
}

/// The concurrent fetch task, joined at most once.
pub struct Dep11Task {
    handle: Option<JoinHandle<PublishResult<Option<PathBuf>>>>,
    resolved: Option<PathBuf>,
}

impl Dep11Task {
    /// Spawn the fetch for a repository.
    pub fn spawn(
        config: Arc<PublisherConfig>,
        validator: Arc<dyn SupplementValidator>,
        repo_name: String,
    ) -> Self {
        let handle = tokio::spawn(async move {
            retrieve_dep11_data(&config, validator.as_ref(), &repo_name).await
        });
        Self {
            handle: Some(handle),
            resolved: None,
        }
    }

    /// Join the fetch, propagating a hard failure; subsequent calls return
    /// the cached result.
    pub async fn resolve(&mut self) -> PublishResult<Option<&Path>> {
        if let Some(handle) = self.handle.take() {
            self.resolved = handle
                .await
                .map_err(|e| PublishError::Hook(format!("fetch task failed: {}", e)))??;
        }
        Ok(self.resolved.as_deref())
    }
}

/// Merge fetched DEP-11 data for one component into the staged suite tree.
///
/// Looks for `Components-<arch>.yml` and `CID-Index-<arch>.json` per
/// architecture plus component-level icon tarballs under
/// `<dep11_dir>/<suite>/<component>/`; scopes without data are skipped.
pub fn fold_dep11_data(
    suite_temp_dir: &Path,
    dep11_src_dir: &Path,
    suite_name: &str,
    component: &str,
    architectures: &[ArchiveArchitecture],
) -> PublishResult<Vec<MetadataFileRecord>> {
    let mut records = Vec::new();
    let dep11_subdir = format!("{}/dep11", component);
    let src_component_dir = dep11_src_dir.join(suite_name).join(component);

    for arch in architectures {
        let basenames = [
            format!("Components-{}.yml", arch.name),
            format!("CID-Index-{}.json", arch.name),
        ];
        for basename in &basenames {
            let source = ["gz", "xz"]
                .iter()
                .map(|ext| src_component_dir.join(format!("{}.{}", basename, ext)))
                .find(|p| p.is_file());
            let Some(source) = source else {
                continue;
            };

            // the CID index is only ever shipped xz-compressed
            let only_encoding = if basename.starts_with("CID-Index") {
                Some(Compression::Xz)
            } else {
                None
            };
            records.extend(import_metadata_file(
                suite_temp_dir,
                &dep11_subdir,
                basename,
                &source,
                only_encoding,
            )?);
        }
    }

    if src_component_dir.is_dir() {
        for entry in fs::read_dir(&src_component_dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with("icons-") || !name.ends_with(".tar.gz") {
                continue;
            }
            let basename = name.trim_end_matches(".gz");
            records.extend(import_metadata_file(
                suite_temp_dir,
                &dep11_subdir,
                basename,
                &entry.path(),
                Some(Compression::Gzip),
            )?);
        }
    }

    Ok(records)
}
