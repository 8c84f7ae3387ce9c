//! Release descriptor composition.
//!
//! Builds the per-scope Release stanzas and the suite's root release
//! descriptor carrying the checksum manifest over everything written during
//! the publish cycle.

use std::path::Path;

use apt_meta::{persist_bytes, ControlStanza, MetadataFileRecord};
use chrono::{DateTime, Duration, Utc};

use crate::catalog::{ArchiveRepository, RepoSuiteSettings};
use crate::error::PublishResult;

/// Number of days after which a published release descriptor expires.
/// Suites are republished after six days even without changes, leaving a
/// two-day margin before this window lapses.
pub const VALIDITY_DAYS: i64 = 8;

const RFC2822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Write the minimal Release stanza for one (component, architecture-or-
/// source) scope into the staged tree and return its checksum record.
pub fn write_release_file_for_arch(
    root: &Path,
    subdir: &str,
    repo: &ArchiveRepository,
    rss: &RepoSuiteSettings,
    component: &str,
    arch_name: &str,
) -> PublishResult<MetadataFileRecord> {
    let mut entry = ControlStanza::new();
    entry.set_optional("Origin", &repo.origin_name);
    entry.set_optional("Archive", &rss.suite.name);
    entry.set_optional("Version", &rss.suite.version);
    entry.set_optional("Component", component);
    entry.set("Architecture", arch_name);

    Ok(persist_bytes(root, subdir, "Release", entry.render().as_bytes())?)
}

/// Compose the root release descriptor for a suite.
///
/// Sorts the given records by relative path and renders them as the SHA256
/// manifest. `Valid-Until` is omitted for frozen suites; `Acquire-By-Hash`
/// is the constant `no` because the by-hash layout is not implemented.
pub fn compose_root_release(
    repo: &ArchiveRepository,
    rss: &RepoSuiteSettings,
    generated_at: DateTime<Utc>,
    meta_files: &mut Vec<MetadataFileRecord>,
) -> String {
    let mut entry = ControlStanza::new();
    entry.set_optional("Origin", &repo.origin_name);
    entry.set_optional("Suite", &rss.suite.name);
    entry.set_optional("Version", &rss.suite.version);
    entry.set_optional("Codename", rss.suite.alias.as_deref().unwrap_or(""));
    entry.set_optional("Label", rss.suite.summary.as_deref().unwrap_or(""));
    entry.set("Date", generated_at.format(RFC2822_FORMAT).to_string());
    if !rss.frozen {
        entry.set(
            "Valid-Until",
            (generated_at + Duration::days(VALIDITY_DAYS))
                .format(RFC2822_FORMAT)
                .to_string(),
        );
    }
    // TODO: implement the by-hash layout, then announce it here
    entry.set("Acquire-By-Hash", "no");

    let mut arch_names: Vec<&str> = rss
        .suite
        .architectures
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    arch_names.sort_unstable();
    entry.set("Architectures", arch_names.join(" "));

    let mut component_names: Vec<&str> = rss
        .suite
        .components
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    component_names.sort_unstable();
    entry.set("Components", component_names.join(" "));

    meta_files.sort();
    entry.set_multiline(
        "SHA256",
        meta_files
            .iter()
            .map(|f| format!("{} {: >8} {}", f.sha256, f.size, f.path)),
    );

    entry.render()
}
