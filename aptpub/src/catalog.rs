//! Catalog data model and query surface.
//!
//! The package catalog is an external collaborator: the engine consumes it
//! through the [`Catalog`] trait and writes back nothing but the
//! `changes_pending`/`time_published` pair on a successful publish.
//! [`MemoryCatalog`] implements the trait over an in-memory snapshot, which
//! can be deserialized from a JSON dump of the relational catalog.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use debversion::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Error from a catalog query or flag update.
#[derive(Debug, Error)]
#[error("Catalog error: {0}")]
pub struct CatalogError(pub String);

/// A named repository, the root of one archive tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRepository {
    /// Unique repository name, also its directory name under the archive root.
    pub name: String,
    /// Origin identifier emitted into release descriptors.
    pub origin_name: String,
}

/// A named subdivision of a suite's package set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveComponent {
    /// Component name, e.g. "main".
    pub name: String,
}

/// A CPU/platform target, or "all" for architecture-independent content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveArchitecture {
    /// Architecture name, e.g. "amd64".
    pub name: String,
}

/// A release channel inside a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSuite {
    /// Suite name, e.g. "stable".
    pub name: String,
    /// Version label of the release.
    #[serde(default)]
    pub version: String,
    /// Optional codename, emitted as `Codename`.
    #[serde(default)]
    pub alias: Option<String>,
    /// Optional human-readable summary, emitted as `Label`.
    #[serde(default)]
    pub summary: Option<String>,
    /// Names of parent suites providing inherited background context.
    /// Consumed by dependency analysis, not by publishing.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Components of this suite.
    pub components: Vec<ArchiveComponent>,
    /// Architectures supported by this suite.
    pub architectures: Vec<ArchiveArchitecture>,
}

impl ArchiveSuite {
    /// The suite's primary architecture: the first concrete one, falling
    /// back to whatever is listed first when only "all" exists.
    pub fn primary_architecture(&self) -> Option<&ArchiveArchitecture> {
        self.architectures
            .iter()
            .find(|a| a.name != "all")
            .or_else(|| self.architectures.first())
    }
}

/// Publish-relevant mutable state for one (repository, suite) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSuiteSettings {
    /// The suite this state belongs to.
    pub suite: ArchiveSuite,
    /// Publishing is forbidden while set.
    #[serde(default)]
    pub frozen: bool,
    /// Set by ingestion when the suite's content changed; cleared on publish.
    #[serde(default)]
    pub changes_pending: bool,
    /// Timestamp of the last successful publish.
    pub time_published: DateTime<Utc>,
    /// Fingerprints of the keys authorized to sign this suite's release.
    #[serde(default)]
    pub signing_keys: Vec<String>,
}

/// Reference to a content file belonging to a package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageFileRef {
    /// Path relative to the repository root.
    pub fname: String,
    /// File size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 digest of the file.
    pub sha256sum: String,
}

fn default_phased_update() -> u8 {
    100
}

/// A source package row from the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePackageRow {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Suites this row is published in.
    pub suites: Vec<String>,
    /// Component this row belongs to.
    pub component: String,
    /// Names of the binary packages this source builds.
    pub expected_binaries: Vec<String>,
    /// Maintainer name and address.
    pub maintainer: String,
    /// Original maintainer, for derivative archives.
    pub original_maintainer: Option<String>,
    /// Co-maintainer names and addresses.
    pub uploaders: Vec<String>,
    /// Architectures the source declares buildable.
    pub architectures: Vec<String>,
    /// Source format version, e.g. "3.0 (quilt)".
    pub format_version: Option<String>,
    /// Declared standards version.
    pub standards_version: Option<String>,
    /// Archive section.
    pub section: Option<String>,
    /// Upstream homepage.
    pub homepage: Option<String>,
    /// VCS web view.
    pub vcs_browser: Option<String>,
    /// VCS git location.
    pub vcs_git: Option<String>,
    /// Build-time dependency relations.
    pub build_depends: Vec<String>,
    /// Architecture-independent build-time dependency relations.
    pub build_depends_indep: Vec<String>,
    /// Build-time conflict relations.
    pub build_conflicts: Vec<String>,
    /// Architecture-independent build-time conflict relations.
    pub build_conflicts_indep: Vec<String>,
    /// Declared test suites.
    pub testsuite: Vec<String>,
    /// Packages triggering the declared test suites.
    pub testsuite_triggers: Vec<String>,
    /// Pool directory holding the source's files.
    pub directory: String,
    /// Files making up this source package.
    pub files: Vec<PackageFileRef>,
    /// Free-form extra fields merged into the generated stanza.
    pub extra_data: Vec<(String, String)>,
    /// Soft-deletion timestamp; deleted rows are kept for audit but never
    /// selected for publishing.
    pub time_deleted: Option<DateTime<Utc>>,
}

/// A binary package row from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryPackageRow {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Suites this row is published in.
    pub suites: Vec<String>,
    /// Component this row belongs to.
    pub component: String,
    /// Architecture this binary was built for.
    pub architecture: String,
    /// Name of the source package this binary was built from.
    pub source_name: String,
    /// Version of the source package this binary was built from.
    pub source_version: String,
    /// Maintainer name and address.
    pub maintainer: String,
    /// Short description.
    pub summary: String,
    /// Full description text; continuation lines are plain newline-separated,
    /// without the control-file leading space.
    pub description: String,
    /// Checksum over the description, for translation lookup.
    pub description_md5: String,
    /// Upstream homepage.
    pub homepage: Option<String>,
    /// Multi-arch policy, e.g. "same" or "foreign".
    pub multi_arch: Option<String>,
    /// Archive section.
    pub section: Option<String>,
    /// Package priority.
    pub priority: Option<String>,
    /// Pre-dependency relations.
    pub pre_depends: Vec<String>,
    /// Dependency relations.
    pub depends: Vec<String>,
    /// Replaces relations.
    pub replaces: Vec<String>,
    /// Provides relations.
    pub provides: Vec<String>,
    /// Recommends relations.
    pub recommends: Vec<String>,
    /// Suggests relations.
    pub suggests: Vec<String>,
    /// Enhances relations.
    pub enhances: Vec<String>,
    /// Conflicts relations.
    pub conflicts: Vec<String>,
    /// Breaks relations.
    pub breaks: Vec<String>,
    /// Built-Using relations.
    pub built_using: Vec<String>,
    /// Installed size in kibibytes; emitted only when positive.
    pub size_installed: i64,
    /// The .deb file backing this row.
    pub bin_file: PackageFileRef,
    /// Phased-rollout percentage; emitted only when below 100.
    pub phased_update_percentage: u8,
    /// Free-form extra fields merged into the generated stanza.
    pub extra_data: Vec<(String, String)>,
    /// Soft-deletion timestamp.
    pub time_deleted: Option<DateTime<Utc>>,
}

impl Default for BinaryPackageRow {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            suites: Vec::new(),
            component: String::new(),
            architecture: String::new(),
            source_name: String::new(),
            source_version: String::new(),
            maintainer: String::new(),
            summary: String::new(),
            description: String::new(),
            description_md5: String::new(),
            homepage: None,
            multi_arch: None,
            section: None,
            priority: None,
            pre_depends: Vec::new(),
            depends: Vec::new(),
            replaces: Vec::new(),
            provides: Vec::new(),
            recommends: Vec::new(),
            suggests: Vec::new(),
            enhances: Vec::new(),
            conflicts: Vec::new(),
            breaks: Vec::new(),
            built_using: Vec::new(),
            size_installed: 0,
            bin_file: PackageFileRef::default(),
            phased_update_percentage: default_phased_update(),
            extra_data: Vec::new(),
            time_deleted: None,
        }
    }
}

/// One deduplicated package description for the translation index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionRow {
    /// Package name.
    pub package: String,
    /// Checksum over the description.
    pub description_md5: String,
    /// Full description text.
    pub description: String,
}

/// Query surface the publishing engine consumes from the catalog.
///
/// Selection semantics belong to the implementation: package listings return
/// the latest version per package name for the requested scope, excluding
/// soft-deleted rows.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// List all repositories.
    async fn repositories(&self) -> Result<Vec<ArchiveRepository>, CatalogError>;

    /// Publish-relevant settings of every suite in a repository.
    async fn suite_settings(&self, repo: &str) -> Result<Vec<RepoSuiteSettings>, CatalogError>;

    /// Latest-version, non-deleted source packages for a scope.
    async fn source_packages(
        &self,
        repo: &str,
        suite: &str,
        component: &str,
    ) -> Result<Vec<SourcePackageRow>, CatalogError>;

    /// Latest-version, non-deleted binary packages for a scope.
    async fn binary_packages(
        &self,
        repo: &str,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackageRow>, CatalogError>;

    /// Per-name deduplicated package descriptions for the translation index.
    async fn package_descriptions(
        &self,
        repo: &str,
        suite: &str,
        component: &str,
    ) -> Result<Vec<DescriptionRow>, CatalogError>;

    /// Record a successful publish: clear `changes_pending` and set
    /// `time_published`, committed together.
    async fn mark_published(
        &self,
        repo: &str,
        suite: &str,
        time: DateTime<Utc>,
    ) -> Result<(), CatalogError>;
}

/// One repository's slice of a catalog snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// The repository itself.
    pub repository: ArchiveRepository,
    /// Suite settings for every suite of the repository.
    pub suites: Vec<RepoSuiteSettings>,
    /// All known source package rows, across versions.
    #[serde(default)]
    pub source_packages: Vec<SourcePackageRow>,
    /// All known binary package rows, across versions.
    #[serde(default)]
    pub binary_packages: Vec<BinaryPackageRow>,
}

/// A complete catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// All repositories with their suites and packages.
    pub repositories: Vec<RepositoryRecord>,
}

/// In-memory [`Catalog`] over a [`CatalogSnapshot`].
pub struct MemoryCatalog {
    snapshot: RwLock<CatalogSnapshot>,
}

/// True when `candidate` sorts after `current` by Debian version ordering,
/// falling back to lexicographic comparison for unparsable versions.
fn version_newer(candidate: &str, current: &str) -> bool {
    match (candidate.parse::<Version>(), current.parse::<Version>()) {
        (Ok(a), Ok(b)) => a > b,
        _ => candidate > current,
    }
}

impl MemoryCatalog {
    /// Create a catalog over the given snapshot.
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Load a snapshot from a JSON dump.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let file = File::open(path)
            .map_err(|e| CatalogError(format!("cannot open snapshot {}: {}", path.display(), e)))?;
        let snapshot: CatalogSnapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CatalogError(format!("cannot parse snapshot {}: {}", path.display(), e)))?;
        Ok(Self::new(snapshot))
    }

    async fn with_repo<T>(
        &self,
        repo: &str,
        f: impl FnOnce(&RepositoryRecord) -> T,
    ) -> Result<T, CatalogError> {
        let snapshot = self.snapshot.read().await;
        snapshot
            .repositories
            .iter()
            .find(|r| r.repository.name == repo)
            .map(f)
            .ok_or_else(|| CatalogError(format!("unknown repository: {}", repo)))
    }
}

/// Pick the maximum version per package name out of in-scope rows.
fn select_latest<'a, T>(
    rows: impl Iterator<Item = &'a T>,
    name: impl Fn(&T) -> &str,
    version: impl Fn(&T) -> &str,
) -> Vec<&'a T> {
    let mut latest: HashMap<&str, &T> = HashMap::new();
    for row in rows {
        match latest.get(name(row)) {
            Some(current) if !version_newer(version(row), version(current)) => {}
            _ => {
                latest.insert(name(row), row);
            }
        }
    }
    let mut selected: Vec<&T> = latest.into_values().collect();
    selected.sort_by(|a, b| name(a).cmp(name(b)));
    selected
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn repositories(&self) -> Result<Vec<ArchiveRepository>, CatalogError> {
        let snapshot = self.snapshot.read().await;
        Ok(snapshot
            .repositories
            .iter()
            .map(|r| r.repository.clone())
            .collect())
    }

    async fn suite_settings(&self, repo: &str) -> Result<Vec<RepoSuiteSettings>, CatalogError> {
        self.with_repo(repo, |r| r.suites.clone()).await
    }

    async fn source_packages(
        &self,
        repo: &str,
        suite: &str,
        component: &str,
    ) -> Result<Vec<SourcePackageRow>, CatalogError> {
        self.with_repo(repo, |r| {
            let in_scope = r.source_packages.iter().filter(|p| {
                p.time_deleted.is_none()
                    && p.component == component
                    && p.suites.iter().any(|s| s == suite)
            });
            select_latest(in_scope, |p| p.name.as_str(), |p| p.version.as_str())
                .into_iter()
                .cloned()
                .collect()
        })
        .await
    }

    async fn binary_packages(
        &self,
        repo: &str,
        suite: &str,
        component: &str,
        arch: &str,
    ) -> Result<Vec<BinaryPackageRow>, CatalogError> {
        self.with_repo(repo, |r| {
            let in_scope = r.binary_packages.iter().filter(|p| {
                p.time_deleted.is_none()
                    && p.component == component
                    && p.architecture == arch
                    && p.suites.iter().any(|s| s == suite)
            });
            select_latest(in_scope, |p| p.name.as_str(), |p| p.version.as_str())
                .into_iter()
                .cloned()
                .collect()
        })
        .await
    }

    async fn package_descriptions(
        &self,
        repo: &str,
        suite: &str,
        component: &str,
    ) -> Result<Vec<DescriptionRow>, CatalogError> {
        self.with_repo(repo, |r| {
            // latest version per name regardless of architecture; which
            // architecture's row wins is arbitrary
            let in_scope = r.binary_packages.iter().filter(|p| {
                p.time_deleted.is_none()
                    && p.component == component
                    && p.suites.iter().any(|s| s == suite)
            });
            select_latest(in_scope, |p| p.name.as_str(), |p| p.version.as_str())
                .into_iter()
                .map(|p| DescriptionRow {
                    package: p.name.clone(),
                    description_md5: p.description_md5.clone(),
                    description: p.description.clone(),
                })
                .collect()
        })
        .await
    }

    async fn mark_published(
        &self,
        repo: &str,
        suite: &str,
        time: DateTime<Utc>,
    ) -> Result<(), CatalogError> {
        let mut snapshot = self.snapshot.write().await;
        let record = snapshot
            .repositories
            .iter_mut()
            .find(|r| r.repository.name == repo)
            .ok_or_else(|| CatalogError(format!("unknown repository: {}", repo)))?;
        let rss = record
            .suites
            .iter_mut()
            .find(|s| s.suite.name == suite)
            .ok_or_else(|| CatalogError(format!("unknown suite: {}/{}", repo, suite)))?;
        rss.changes_pending = false;
        rss.time_published = time;
        Ok(())
    }
}
