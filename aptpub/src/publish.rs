//! The archive publishing engine.
//!
//! Entry point for turning a catalog snapshot into a signed, published
//! `dists` tree. A publish cycle stages a working copy of the existing tree,
//! regenerates every index, folds in externally fetched supplemental
//! metadata, signs the release descriptor and atomically swaps the staged
//! tree into place. Readers of the published path never observe a mixture of
//! two cycles; the swap is the only visibility boundary.

use std::fs;
use std::sync::Arc;

use apt_meta::{persist_bytes, write_compressed_files, Compression, MetadataFileRecord};
use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::catalog::{ArchiveRepository, Catalog, RepoSuiteSettings};
use crate::config::PublisherConfig;
use crate::dep11::{fold_dep11_data, Dep11Task, SupplementValidator};
use crate::error::{PublishError, PublishResult};
use crate::fsutil;
use crate::indices::{
    generate_i18n_template_data, generate_packages_index, generate_sources_index,
};
use crate::lock::RepoLock;
use crate::release::{compose_root_release, write_release_file_for_arch};
use crate::signing::{SignMode, Signer};

/// Days a suite may remain unpublished before a cycle is forced even
/// without pending changes, keeping the release's validity window from
/// lapsing (it expires two days later).
pub const STALE_AFTER_DAYS: i64 = 6;

/// Encodings for Sources and translation indices.
const INDEX_COMPRESSIONS: &[Compression] = &[Compression::Xz];
/// Encodings for Packages indices; gzip is kept for older clients.
const PACKAGES_COMPRESSIONS: &[Compression] = &[Compression::Gzip, Compression::Xz];

/// One repository that failed to publish, with its error.
pub type FailedRepository = (String, PublishError);

/// The archive metadata publisher.
pub struct ArchivePublisher {
    config: Arc<PublisherConfig>,
    catalog: Arc<dyn Catalog>,
    signer: Arc<dyn Signer>,
    validator: Arc<dyn SupplementValidator>,
}

impl ArchivePublisher {
    /// Create a publisher over the given collaborators.
    pub fn new(
        config: Arc<PublisherConfig>,
        catalog: Arc<dyn Catalog>,
        signer: Arc<dyn Signer>,
        validator: Arc<dyn SupplementValidator>,
    ) -> Self {
        Self {
            config,
            catalog,
            signer,
            validator,
        }
    }

    /// Publish all repositories (or a single one), optionally restricted to
    /// one suite.
    ///
    /// A failing repository never aborts the batch; failures are collected
    /// and returned so the caller can report them and exit non-zero.
    pub async fn publish(
        &self,
        repo_name: Option<&str>,
        suite_name: Option<&str>,
        force: bool,
    ) -> PublishResult<Vec<FailedRepository>> {
        let mut repos = self.catalog.repositories().await?;
        if let Some(name) = repo_name {
            repos.retain(|r| r.name == name);
            if repos.is_empty() {
                return Err(PublishError::Configuration(format!(
                    "unable to find repository with name {}",
                    name
                )));
            }
        }

        let mut failures = Vec::new();
        for repo in &repos {
            if let Err(e) = self.publish_repo_dists(repo, suite_name, force).await {
                error!("Error while publishing repository {}: {}", repo.name, e);
                failures.push((repo.name.clone(), e));
            }
        }
        Ok(failures)
    }

    /// Publish `dists/` data for all (modified) suites in one repository.
    pub async fn publish_repo_dists(
        &self,
        repo: &ArchiveRepository,
        suite_name: Option<&str>,
        force: bool,
    ) -> PublishResult<()> {
        let _lock = RepoLock::acquire(&self.config.lock_dir, &repo.name)?;

        // fetch external data concurrently; its latency overlaps with
        // staging and index generation, the task is joined before the
        // staged tree consumes its result
        let mut dep11 = Dep11Task::spawn(
            Arc::clone(&self.config),
            Arc::clone(&self.validator),
            repo.name.clone(),
        );

        let suite_settings = self.catalog.suite_settings(&repo.name).await?;
        for rss in &suite_settings {
            if let Some(only) = suite_name {
                if rss.suite.name != only {
                    continue;
                }
            }
            self.publish_suite_dists(repo, rss, &mut dep11, force).await?;
        }

        // a hook failure aborts the repository cycle even when every suite
        // was skipped, so it is never silently lost
        dep11.resolve().await?;

        info!("Published: {}", repo.name);
        Ok(())
    }

    /// Run one suite's publish cycle. Returns true when a new tree was
    /// swapped into place, false when the suite was skipped.
    async fn publish_suite_dists(
        &self,
        repo: &ArchiveRepository,
        rss: &RepoSuiteSettings,
        dep11: &mut Dep11Task,
        force: bool,
    ) -> PublishResult<bool> {
        // we must never touch a frozen suite
        if rss.frozen {
            debug!(
                "Not publishing frozen suite {}/{}",
                repo.name, rss.suite.name
            );
            return Ok(false);
        }

        // publish if forced, explicitly marked as pending, or if the last
        // cycle is old enough that the release descriptor would expire soon
        let stale = rss.time_published < Utc::now() - Duration::days(STALE_AFTER_DAYS);
        if !rss.changes_pending && !force && !stale {
            info!(
                "Not updating {}/{}: No pending changes.",
                repo.name, rss.suite.name
            );
            return Ok(false);
        }

        info!("Publishing: {}/{}", repo.name, rss.suite.name);

        let repo_dists_dir = self.config.repo_dists_dir(&repo.name);
        let temp_dists_dir = self.config.repo_staging_dir(&repo.name);
        let suite_temp_dir = temp_dists_dir.join(&rss.suite.name);

        // remove possible remnants of an older, interrupted publish cycle
        if temp_dists_dir.is_dir() {
            fs::remove_dir_all(&temp_dists_dir)?;
        }

        // copy the published tree to the staging location for editing
        if repo_dists_dir.is_dir() {
            fsutil::copy_tree(&repo_dists_dir, &temp_dists_dir)?;
        }
        fs::create_dir_all(&suite_temp_dir)?;

        // regenerate all metadata into the staged tree
        let mut meta_files: Vec<MetadataFileRecord> = Vec::new();
        for component in &rss.suite.components {
            let sources_subdir = format!("{}/source", component.name);
            let spkgs = self
                .catalog
                .source_packages(&repo.name, &rss.suite.name, &component.name)
                .await?;
            let sources_data = generate_sources_index(&spkgs);
            meta_files.extend(write_compressed_files(
                &suite_temp_dir,
                &sources_subdir,
                "Sources",
                &sources_data,
                INDEX_COMPRESSIONS,
            )?);
            meta_files.push(write_release_file_for_arch(
                &suite_temp_dir,
                &sources_subdir,
                repo,
                rss,
                &component.name,
                "source",
            )?);

            for arch in &rss.suite.architectures {
                let arch_subdir = format!("{}/binary-{}", component.name, arch.name);
                let bpkgs = self
                    .catalog
                    .binary_packages(&repo.name, &rss.suite.name, &component.name, &arch.name)
                    .await?;
                let pkg_data = generate_packages_index(&bpkgs, &arch.name);
                meta_files.extend(write_compressed_files(
                    &suite_temp_dir,
                    &arch_subdir,
                    "Packages",
                    &pkg_data,
                    PACKAGES_COMPRESSIONS,
                )?);
                meta_files.push(write_release_file_for_arch(
                    &suite_temp_dir,
                    &arch_subdir,
                    repo,
                    rss,
                    &component.name,
                    &arch.name,
                )?);
            }

            let i18n_subdir = format!("{}/i18n", component.name);
            let descriptions = self
                .catalog
                .package_descriptions(&repo.name, &rss.suite.name, &component.name)
                .await?;
            let i18n_data = generate_i18n_template_data(&descriptions);
            meta_files.extend(write_compressed_files(
                &suite_temp_dir,
                &i18n_subdir,
                "Translation-en",
                &i18n_data,
                INDEX_COMPRESSIONS,
            )?);
        }

        // join the external fetch and fold its data into matching scopes
        if let Some(dep11_src_dir) = dep11.resolve().await? {
            for component in &rss.suite.components {
                meta_files.extend(fold_dep11_data(
                    &suite_temp_dir,
                    dep11_src_dir,
                    &rss.suite.name,
                    &component.name,
                    &rss.suite.architectures,
                )?);
            }
        }

        // compose and sign the root release descriptor
        let generated_at = Utc::now();
        let release_data = compose_root_release(repo, rss, generated_at, &mut meta_files);
        persist_bytes(&suite_temp_dir, "", "Release", release_data.as_bytes())?;

        let inline_signed = self
            .signer
            .sign(release_data.as_bytes(), &rss.signing_keys, SignMode::Inline)
            .await?;
        persist_bytes(&suite_temp_dir, "", "InRelease", &inline_signed)?;
        let detached_signed = self
            .signer
            .sign(
                release_data.as_bytes(),
                &rss.signing_keys,
                SignMode::Detached,
            )
            .await?;
        persist_bytes(&suite_temp_dir, "", "Release.gpg", &detached_signed)?;

        // mark the changes live: exchange staged and published trees
        // atomically, then delete the now-stale copy. The exchange is the
        // irrevocable commit point; nothing after it may trigger another.
        if repo_dists_dir.is_dir() {
            fsutil::exchange_paths(&temp_dists_dir, &repo_dists_dir).map_err(|source| {
                PublishError::Swap {
                    staged: temp_dists_dir.clone(),
                    published: repo_dists_dir.clone(),
                    source,
                }
            })?;
            if let Err(e) = fs::remove_dir_all(&temp_dists_dir) {
                warn!(
                    "Stale staging copy {} could not be removed: {}",
                    temp_dists_dir.display(),
                    e
                );
            }
        } else {
            fs::rename(&temp_dists_dir, &repo_dists_dir).map_err(|source| PublishError::Swap {
                staged: temp_dists_dir.clone(),
                published: repo_dists_dir.clone(),
                source,
            })?;
        }

        // the tree is live; record that fact in the catalog. Some uploads
        // may have been accepted while we were publishing, which is fine:
        // the suite is republished at least once a week anyway.
        if let Err(e) = self
            .catalog
            .mark_published(&repo.name, &rss.suite.name, generated_at)
            .await
        {
            error!(
                "Suite {}/{} was published but updating its catalog state failed: {}",
                repo.name, rss.suite.name, e
            );
            return Err(e.into());
        }

        Ok(true)
    }
}
