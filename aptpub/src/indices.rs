//! Index content generation.
//!
//! Turns catalog rows into the textual Sources, Packages and translation
//! template indices. Selection (latest version, soft-delete exclusion) has
//! already happened in the catalog; this module only renders.

use apt_meta::{join_stanzas, ControlStanza};
use tracing::warn;

use crate::catalog::{BinaryPackageRow, DescriptionRow, SourcePackageRow};

fn join_list(values: &[String]) -> String {
    values.join(", ")
}

fn apply_extra_data(stanza: &mut ControlStanza, package: &str, extra: &[(String, String)]) {
    for (key, value) in extra {
        if !stanza.set_extra(key, value) {
            warn!(
                "Ignoring extra field {} of {}: collides with a fixed field",
                key, package
            );
        }
    }
}

/// Generate Sources index data for one (repository, suite, component) scope.
///
/// An empty selection is a valid outcome and yields an empty string.
pub fn generate_sources_index(spkgs: &[SourcePackageRow]) -> String {
    let mut entries = Vec::new();
    for spkg in spkgs {
        let mut entry = ControlStanza::new();
        entry.set_optional("Package", &spkg.name);
        entry.set_optional("Version", &spkg.version);
        entry.set_optional("Binary", &join_list(&spkg.expected_binaries));
        entry.set_optional("Maintainer", &spkg.maintainer);
        entry.set_optional(
            "Original-Maintainer",
            spkg.original_maintainer.as_deref().unwrap_or(""),
        );
        entry.set_optional("Uploaders", &join_list(&spkg.uploaders));

        entry.set_optional("Architecture", &join_list(&spkg.architectures));
        entry.set_optional("Format", spkg.format_version.as_deref().unwrap_or(""));
        entry.set_optional(
            "Standards-Version",
            spkg.standards_version.as_deref().unwrap_or(""),
        );

        entry.set_optional("Section", spkg.section.as_deref().unwrap_or(""));
        entry.set_optional("Homepage", spkg.homepage.as_deref().unwrap_or(""));
        entry.set_optional("Vcs-Browser", spkg.vcs_browser.as_deref().unwrap_or(""));
        entry.set_optional("Vcs-Git", spkg.vcs_git.as_deref().unwrap_or(""));

        entry.set_optional("Build-Depends", &join_list(&spkg.build_depends));
        entry.set_optional("Build-Depends-Indep", &join_list(&spkg.build_depends_indep));
        entry.set_optional("Build-Conflicts", &join_list(&spkg.build_conflicts));
        entry.set_optional(
            "Build-Conflicts-Indep",
            &join_list(&spkg.build_conflicts_indep),
        );

        entry.set_optional("Testsuite", &join_list(&spkg.testsuite));
        entry.set_optional("Testsuite-Triggers", &join_list(&spkg.testsuite_triggers));

        entry.set_optional("Directory", &spkg.directory);
        entry.set_multiline(
            "Checksums-Sha256",
            spkg.files
                .iter()
                .map(|f| format!("{} {} {}", f.sha256sum, f.size, f.fname)),
        );

        apply_extra_data(&mut entry, &spkg.name, &spkg.extra_data);
        entries.push(entry);
    }

    join_stanzas(&entries)
}

/// Generate Packages index data for one (repository, suite, component,
/// architecture) scope.
pub fn generate_packages_index(bpkgs: &[BinaryPackageRow], arch_name: &str) -> String {
    let mut entries = Vec::new();
    for bpkg in bpkgs {
        let mut entry = ControlStanza::new();

        // reference the source package only when its name differs, with a
        // version suffix only when the versions differ as well
        let source_info = if bpkg.name != bpkg.source_name {
            if bpkg.version == bpkg.source_version {
                bpkg.source_name.clone()
            } else {
                format!("{} ({})", bpkg.source_name, bpkg.source_version)
            }
        } else {
            String::new()
        };

        entry.set("Package", bpkg.name.clone());
        entry.set_optional("Source", &source_info);
        entry.set_optional("Version", &bpkg.version);
        entry.set_optional("Maintainer", &bpkg.maintainer);
        entry.set_optional("Description", &bpkg.summary);
        entry.set_optional("Description-md5", &bpkg.description_md5);
        entry.set_optional("Homepage", bpkg.homepage.as_deref().unwrap_or(""));
        entry.set_optional("Architecture", arch_name);
        entry.set_optional("Multi-Arch", bpkg.multi_arch.as_deref().unwrap_or(""));
        entry.set_optional("Section", bpkg.section.as_deref().unwrap_or(""));
        entry.set_optional("Priority", bpkg.priority.as_deref().unwrap_or(""));
        entry.set_optional("Pre-Depends", &join_list(&bpkg.pre_depends));
        entry.set_optional("Depends", &join_list(&bpkg.depends));
        entry.set_optional("Replaces", &join_list(&bpkg.replaces));
        entry.set_optional("Provides", &join_list(&bpkg.provides));
        entry.set_optional("Recommends", &join_list(&bpkg.recommends));
        entry.set_optional("Suggests", &join_list(&bpkg.suggests));
        entry.set_optional("Enhances", &join_list(&bpkg.enhances));
        entry.set_optional("Conflicts", &join_list(&bpkg.conflicts));
        entry.set_optional("Breaks", &join_list(&bpkg.breaks));
        entry.set_optional("Built-Using", &join_list(&bpkg.built_using));
        if bpkg.size_installed > 0 {
            entry.set("Installed-Size", bpkg.size_installed.to_string());
        }
        entry.set_optional("Size", &bpkg.bin_file.size.to_string());
        entry.set_optional("Filename", &bpkg.bin_file.fname);
        entry.set_optional("SHA256", &bpkg.bin_file.sha256sum);
        if bpkg.phased_update_percentage < 100 {
            entry.set(
                "Phased-Update-Percentage",
                bpkg.phased_update_percentage.to_string(),
            );
        }

        apply_extra_data(&mut entry, &bpkg.name, &bpkg.extra_data);
        entries.push(entry);
    }

    join_stanzas(&entries)
}

/// Generate translation template data for one (repository, suite, component)
/// scope, one stanza per package name.
pub fn generate_i18n_template_data(descriptions: &[DescriptionRow]) -> String {
    let mut entries = Vec::new();
    for row in descriptions {
        let mut entry = ControlStanza::new();
        entry.set("Package", row.package.clone());
        entry.set("Description-md5", row.description_md5.clone());
        entry.set("Description-en", row.description.clone());
        entries.push(entry);
    }
    join_stanzas(&entries)
}
