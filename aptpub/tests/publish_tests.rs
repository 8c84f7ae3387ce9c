//! End-to-end tests for the publishing engine, running full publish cycles
//! against a temporary archive with an in-memory catalog and fake signing.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use apt_meta::{sha256_hex, Compression};
use aptpub::catalog::{
    ArchiveArchitecture, ArchiveComponent, ArchiveRepository, ArchiveSuite, BinaryPackageRow,
    Catalog, CatalogSnapshot, MemoryCatalog, PackageFileRef, RepoSuiteSettings, RepositoryRecord,
    SourcePackageRow,
};
use aptpub::config::PublisherConfig;
use aptpub::dep11::AcceptingValidator;
use aptpub::error::{PublishError, PublishResult};
use aptpub::publish::ArchivePublisher;
use aptpub::signing::{SignMode, Signer};

struct FakeSigner;

#[async_trait]
impl Signer for FakeSigner {
    async fn sign(
        &self,
        input: &[u8],
        key_ids: &[String],
        mode: SignMode,
    ) -> PublishResult<Vec<u8>> {
        if key_ids.is_empty() {
            return Err(PublishError::Signing(
                "no authorized signing keys configured".to_string(),
            ));
        }
        Ok(match mode {
            SignMode::Inline => [
                b"-----BEGIN PGP SIGNED MESSAGE-----\n".as_slice(),
                input,
                b"-----BEGIN PGP SIGNATURE-----\nfake\n-----END PGP SIGNATURE-----\n".as_slice(),
            ]
            .concat(),
            SignMode::Detached => {
                b"-----BEGIN PGP SIGNATURE-----\nfake\n-----END PGP SIGNATURE-----\n".to_vec()
            }
        })
    }
}

struct FailingSigner;

#[async_trait]
impl Signer for FailingSigner {
    async fn sign(
        &self,
        _input: &[u8],
        _key_ids: &[String],
        _mode: SignMode,
    ) -> PublishResult<Vec<u8>> {
        Err(PublishError::Signing("signer unavailable".to_string()))
    }
}

fn test_config(root: &Path) -> PublisherConfig {
    PublisherConfig {
        archive_root_dir: root.join("archive"),
        data_import_hooks_dir: root.join("hooks"),
        cache_dir: root.join("cache"),
        lock_dir: root.join("locks"),
        secret_gpg_home_dir: root.join("keyring"),
        dep11_validator: None,
    }
}

fn sample_suite() -> ArchiveSuite {
    ArchiveSuite {
        name: "stable".to_string(),
        version: "12".to_string(),
        alias: Some("bookworm".to_string()),
        summary: Some("Test Stable".to_string()),
        parents: Vec::new(),
        components: vec![ArchiveComponent {
            name: "main".to_string(),
        }],
        architectures: vec![
            ArchiveArchitecture {
                name: "all".to_string(),
            },
            ArchiveArchitecture {
                name: "amd64".to_string(),
            },
        ],
    }
}

fn sample_source(name: &str, version: &str) -> SourcePackageRow {
    SourcePackageRow {
        name: name.to_string(),
        version: version.to_string(),
        suites: vec!["stable".to_string()],
        component: "main".to_string(),
        expected_binaries: vec![name.to_string()],
        maintainer: "Jane Dev <jane@example.org>".to_string(),
        architectures: vec!["any".to_string()],
        directory: format!("pool/main/{}/{}", &name[..1], name),
        files: vec![PackageFileRef {
            fname: format!("pool/main/{}/{}/{}_{}.dsc", &name[..1], name, name, version),
            size: 1420,
            sha256sum: sha256_hex(format!("{}-{}", name, version).as_bytes()),
        }],
        ..Default::default()
    }
}

fn sample_binary(name: &str, version: &str, arch: &str) -> BinaryPackageRow {
    BinaryPackageRow {
        name: name.to_string(),
        version: version.to_string(),
        suites: vec!["stable".to_string()],
        component: "main".to_string(),
        architecture: arch.to_string(),
        source_name: name.to_string(),
        source_version: version.to_string(),
        maintainer: "Jane Dev <jane@example.org>".to_string(),
        summary: format!("{} summary", name),
        description: format!("{} summary\nLonger descriptive text.", name),
        description_md5: sha256_hex(name.as_bytes())[..32].to_string(),
        depends: vec!["libc6 (>= 2.34)".to_string()],
        size_installed: 280,
        bin_file: PackageFileRef {
            fname: format!(
                "pool/main/{}/{}/{}_{}_{}.deb",
                &name[..1],
                name,
                name,
                version,
                arch
            ),
            size: 56432,
            sha256sum: sha256_hex(format!("{}_{}_{}", name, version, arch).as_bytes()),
        },
        ..Default::default()
    }
}

fn sample_snapshot() -> CatalogSnapshot {
    CatalogSnapshot {
        repositories: vec![RepositoryRecord {
            repository: ArchiveRepository {
                name: "master".to_string(),
                origin_name: "Test Origin".to_string(),
            },
            suites: vec![RepoSuiteSettings {
                suite: sample_suite(),
                frozen: false,
                changes_pending: true,
                time_published: Utc::now() - Duration::days(30),
                signing_keys: vec!["8BE1345CAFE0".to_string()],
            }],
            source_packages: vec![sample_source("hello", "2.10-3")],
            binary_packages: vec![
                sample_binary("hello", "2.10-3", "amd64"),
                sample_binary("hello-doc", "2.10-3", "all"),
            ],
        }],
    }
}

fn make_publisher(
    root: &Path,
    snapshot: CatalogSnapshot,
    signer: Arc<dyn Signer>,
) -> (ArchivePublisher, Arc<MemoryCatalog>) {
    let config = Arc::new(test_config(root));
    let catalog = Arc::new(MemoryCatalog::new(snapshot));
    let publisher = ArchivePublisher::new(
        config,
        catalog.clone(),
        signer,
        Arc::new(AcceptingValidator),
    );
    (publisher, catalog)
}

/// Collect every file under a directory as (relative path, content bytes),
/// sorted by path.
fn collect_files(root: &Path) -> Vec<(String, Vec<u8>)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        for entry in fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if entry.file_type().unwrap().is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
                out.push((rel, fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// Parse the SHA256 manifest of a release descriptor into
/// (checksum, size, path) tuples, in file order.
fn parse_sha256_manifest(release: &str) -> Vec<(String, u64, String)> {
    release
        .lines()
        .skip_while(|line| *line != "SHA256:")
        .skip(1)
        .take_while(|line| line.starts_with(' '))
        .map(|line| {
            let mut parts = line.split_whitespace();
            let sha = parts.next().unwrap().to_string();
            let size = parts.next().unwrap().parse::<u64>().unwrap();
            let path = parts.next().unwrap().to_string();
            (sha, size, path)
        })
        .collect()
}

#[tokio::test]
async fn test_publish_creates_complete_suite_tree() {
    let root = TempDir::new().unwrap();
    let (publisher, catalog) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));

    let failures = publisher.publish(None, None, false).await.unwrap();
    assert!(failures.is_empty());

    let suite_dir = root.path().join("archive/master/dists/stable");
    for file in [
        "Release",
        "InRelease",
        "Release.gpg",
        "main/source/Release",
        "main/source/Sources",
        "main/source/Sources.xz",
        "main/binary-amd64/Release",
        "main/binary-amd64/Packages",
        "main/binary-amd64/Packages.gz",
        "main/binary-amd64/Packages.xz",
        "main/binary-all/Packages",
        "main/i18n/Translation-en",
        "main/i18n/Translation-en.xz",
    ] {
        assert!(suite_dir.join(file).exists(), "missing {}", file);
    }

    // the staging directory is gone after the swap
    assert!(!root.path().join("archive/master/zzz-meta").exists());

    let release = fs::read_to_string(suite_dir.join("Release")).unwrap();
    assert!(release.contains("Origin: Test Origin\n"));
    assert!(release.contains("Suite: stable\n"));
    assert!(release.contains("Codename: bookworm\n"));
    assert!(release.contains("Acquire-By-Hash: no\n"));
    assert!(release.contains("Architectures: all amd64\n"));
    assert!(release.contains("Components: main\n"));
    assert!(release.contains("Valid-Until: "));

    let packages = fs::read_to_string(suite_dir.join("main/binary-amd64/Packages")).unwrap();
    assert!(packages.contains("Package: hello\n"));
    assert!(packages.contains("Architecture: amd64\n"));
    let sources = fs::read_to_string(suite_dir.join("main/source/Sources")).unwrap();
    assert!(sources.contains("Package: hello\n"));
    let translation = fs::read_to_string(suite_dir.join("main/i18n/Translation-en")).unwrap();
    assert!(translation.contains("Package: hello\n"));
    assert!(translation.contains("Package: hello-doc\n"));

    // the inline signature embeds the release descriptor
    let inrelease = fs::read_to_string(suite_dir.join("InRelease")).unwrap();
    assert!(inrelease.contains("Suite: stable\n"));

    // publish state was committed
    let settings = catalog.suite_settings("master").await.unwrap();
    assert!(!settings[0].changes_pending);
    assert!(settings[0].time_published > Utc::now() - Duration::minutes(5));
}

#[tokio::test]
async fn test_frozen_suite_is_never_touched() {
    let root = TempDir::new().unwrap();
    let mut snapshot = sample_snapshot();
    snapshot.repositories[0].suites[0].frozen = true;
    let before = snapshot.repositories[0].suites[0].time_published;
    let (publisher, catalog) = make_publisher(root.path(), snapshot, Arc::new(FakeSigner));

    // force must not override the freeze
    let failures = publisher.publish(None, None, true).await.unwrap();
    assert!(failures.is_empty());

    assert!(!root.path().join("archive/master/dists").exists());
    assert!(!root.path().join("archive/master/zzz-meta").exists());

    let settings = catalog.suite_settings("master").await.unwrap();
    assert!(settings[0].changes_pending);
    assert_eq!(settings[0].time_published, before);
}

#[tokio::test]
async fn test_stale_suite_is_republished_without_pending_changes() {
    let root = TempDir::new().unwrap();
    let mut snapshot = sample_snapshot();
    snapshot.repositories[0].suites[0].changes_pending = false;
    snapshot.repositories[0].suites[0].time_published =
        Utc::now() - Duration::days(6) - Duration::seconds(1);
    let (publisher, _) = make_publisher(root.path(), snapshot, Arc::new(FakeSigner));

    let failures = publisher.publish(None, None, false).await.unwrap();
    assert!(failures.is_empty());
    assert!(root.path().join("archive/master/dists/stable/Release").exists());
}

#[tokio::test]
async fn test_fresh_suite_without_changes_is_skipped() {
    let root = TempDir::new().unwrap();
    let mut snapshot = sample_snapshot();
    snapshot.repositories[0].suites[0].changes_pending = false;
    snapshot.repositories[0].suites[0].time_published = Utc::now() - Duration::days(5);
    let (publisher, _) = make_publisher(root.path(), snapshot, Arc::new(FakeSigner));

    let failures = publisher.publish(None, None, false).await.unwrap();
    assert!(failures.is_empty());
    assert!(!root.path().join("archive/master/dists").exists());
}

#[tokio::test]
async fn test_only_latest_version_is_published() {
    let root = TempDir::new().unwrap();
    let mut snapshot = sample_snapshot();
    snapshot.repositories[0].source_packages = vec![
        sample_source("hello", "1.0"),
        sample_source("hello", "2.0"),
    ];
    let (publisher, _) = make_publisher(root.path(), snapshot, Arc::new(FakeSigner));

    publisher.publish(None, None, false).await.unwrap();

    let sources = fs::read_to_string(
        root.path()
            .join("archive/master/dists/stable/main/source/Sources"),
    )
    .unwrap();
    assert_eq!(sources.matches("Package: hello\n").count(), 1);
    assert!(sources.contains("Version: 2.0\n"));
    assert!(!sources.contains("Version: 1.0\n"));
}

#[tokio::test]
async fn test_checksum_manifest_is_complete_and_verifiable() {
    let root = TempDir::new().unwrap();
    let (publisher, _) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));
    publisher.publish(None, None, false).await.unwrap();

    let suite_dir = root.path().join("archive/master/dists/stable");
    let release = fs::read_to_string(suite_dir.join("Release")).unwrap();
    let manifest = parse_sha256_manifest(&release);
    assert!(!manifest.is_empty());

    // sorted by path, no duplicates
    let paths: Vec<&String> = manifest.iter().map(|(_, _, p)| p).collect();
    let mut sorted_paths = paths.clone();
    sorted_paths.sort();
    sorted_paths.dedup();
    assert_eq!(paths, sorted_paths);

    // every file below the suite root is covered, except the release
    // descriptor and its signatures, and each listed checksum matches an
    // independent recomputation
    for (rel_path, content) in collect_files(&suite_dir) {
        if matches!(rel_path.as_str(), "Release" | "InRelease" | "Release.gpg") {
            continue;
        }
        let entry = manifest.iter().find(|(_, _, p)| *p == rel_path);
        let Some((sha, size, _)) = entry else {
            panic!("file {} missing from manifest", rel_path);
        };
        assert_eq!(*size, content.len() as u64, "size mismatch for {}", rel_path);
        assert_eq!(*sha, sha256_hex(&content), "checksum mismatch for {}", rel_path);
    }

    // compressed indices decompress to the canonical bytes recorded at the
    // extension-less path
    let xz_bytes = fs::read(suite_dir.join("main/source/Sources.xz")).unwrap();
    let canonical = Compression::Xz.decompress(&xz_bytes).unwrap();
    let (sha, size, _) = manifest
        .iter()
        .find(|(_, _, p)| p == "main/source/Sources")
        .unwrap();
    assert_eq!(*size, canonical.len() as u64);
    assert_eq!(*sha, sha256_hex(&canonical));
}

#[tokio::test]
async fn test_publishing_is_deterministic() {
    let root_a = TempDir::new().unwrap();
    let root_b = TempDir::new().unwrap();

    let (publisher_a, _) = make_publisher(root_a.path(), sample_snapshot(), Arc::new(FakeSigner));
    let (publisher_b, _) = make_publisher(root_b.path(), sample_snapshot(), Arc::new(FakeSigner));
    publisher_a.publish(None, None, true).await.unwrap();
    publisher_b.publish(None, None, true).await.unwrap();

    let strip_timestamps = |release: String| -> String {
        release
            .lines()
            .filter(|l| !l.starts_with("Date:") && !l.starts_with("Valid-Until:"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let release_a = strip_timestamps(
        fs::read_to_string(root_a.path().join("archive/master/dists/stable/Release")).unwrap(),
    );
    let release_b = strip_timestamps(
        fs::read_to_string(root_b.path().join("archive/master/dists/stable/Release")).unwrap(),
    );
    assert_eq!(release_a, release_b);
}

#[tokio::test]
async fn test_aborted_cycle_leaves_published_tree_untouched() {
    let root = TempDir::new().unwrap();

    let (publisher, _) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));
    publisher.publish(None, None, false).await.unwrap();
    let dists_dir = root.path().join("archive/master/dists");
    let before = collect_files(&dists_dir);

    // second cycle with more content aborts in the signing stage
    let mut snapshot = sample_snapshot();
    snapshot.repositories[0]
        .source_packages
        .push(sample_source("world", "1.0"));
    let (failing, catalog) = make_publisher(root.path(), snapshot, Arc::new(FailingSigner));
    let failures = failing.publish(None, None, false).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, PublishError::Signing(_)));

    // the published tree is byte-identical to its pre-cycle state
    assert_eq!(collect_files(&dists_dir), before);

    // pending state was not cleared by the failed cycle
    let settings = catalog.suite_settings("master").await.unwrap();
    assert!(settings[0].changes_pending);

    // the next successful cycle removes the leftover staging directory
    let (publisher, _) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));
    publisher.publish(None, None, false).await.unwrap();
    assert!(!root.path().join("archive/master/zzz-meta").exists());
    assert_ne!(collect_files(&dists_dir), before);
}

#[tokio::test]
async fn test_missing_hook_is_tolerated() {
    let root = TempDir::new().unwrap();
    // hooks directory does not even exist
    let (publisher, _) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));

    let failures = publisher.publish(None, None, false).await.unwrap();
    assert!(failures.is_empty());
    assert!(root.path().join("archive/master/dists/stable/Release").exists());
    assert!(!root
        .path()
        .join("archive/master/dists/stable/main/dep11")
        .exists());
}

#[tokio::test]
async fn test_failing_hook_aborts_the_repository_cycle() {
    use std::os::unix::fs::PermissionsExt;

    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    fs::create_dir_all(&config.data_import_hooks_dir).unwrap();
    let hook = config.data_import_hooks_dir.join("fetch-appstream.sh");
    fs::write(&hook, "#!/bin/sh\nexit 1\n").unwrap();
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

    let (publisher, _) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));
    let failures = publisher.publish(None, None, false).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0].1, PublishError::Hook(_)));
}

#[tokio::test]
async fn test_supplemental_data_is_folded_into_the_tree() {
    use std::os::unix::fs::PermissionsExt;

    let root = TempDir::new().unwrap();
    let config = test_config(root.path());

    // prepare DEP-11 fixtures the hook copies into its target directory
    let fixture_dir = root.path().join("fixtures/stable/main");
    fs::create_dir_all(&fixture_dir).unwrap();
    fs::write(
        fixture_dir.join("Components-amd64.yml.gz"),
        Compression::Gzip.compress(b"File: DEP-11\n").unwrap(),
    )
    .unwrap();

    fs::create_dir_all(&config.data_import_hooks_dir).unwrap();
    let hook = config.data_import_hooks_dir.join("fetch-appstream.sh");
    fs::write(
        &hook,
        format!(
            "#!/bin/sh\nset -e\ncp -r {}/. \"$APTPUB_DATA_TARGET_DIR\"/\n",
            root.path().join("fixtures").display()
        ),
    )
    .unwrap();
    fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();

    let (publisher, _) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));
    let failures = publisher.publish(None, None, false).await.unwrap();
    assert!(failures.is_empty());

    let suite_dir = root.path().join("archive/master/dists/stable");
    assert!(suite_dir.join("main/dep11/Components-amd64.yml.xz").exists());
    assert!(suite_dir.join("main/dep11/Components-amd64.yml.gz").exists());

    let release = fs::read_to_string(suite_dir.join("Release")).unwrap();
    let manifest = parse_sha256_manifest(&release);
    assert!(manifest
        .iter()
        .any(|(_, _, p)| p == "main/dep11/Components-amd64.yml.xz"));
}

#[tokio::test]
async fn test_unknown_repository_filter_is_an_error() {
    let root = TempDir::new().unwrap();
    let (publisher, _) = make_publisher(root.path(), sample_snapshot(), Arc::new(FakeSigner));
    let result = publisher.publish(Some("nonexistent"), None, false).await;
    assert!(matches!(result, Err(PublishError::Configuration(_))));
}
