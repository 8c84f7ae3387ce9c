//! Checksum records for published metadata files.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compute the lowercase hex SHA-256 digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A checksum record for one file in the archive tree.
///
/// The complete, path-sorted list of records produced during a publish cycle
/// becomes the SHA256 manifest of the release descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFileRecord {
    /// Path relative to the suite directory.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 digest of the file contents.
    pub sha256: String,
}

impl MetadataFileRecord {
    /// Create a record for in-memory content at the given relative path.
    pub fn for_bytes<S: Into<String>>(path: S, data: &[u8]) -> Self {
        Self {
            path: path.into(),
            size: data.len() as u64,
            sha256: sha256_hex(data),
        }
    }
}

impl PartialOrd for MetadataFileRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataFileRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.size.cmp(&other.size))
            .then_with(|| self.sha256.cmp(&other.sha256))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_bytes() {
        let record = MetadataFileRecord::for_bytes("main/source/Sources", b"hello");
        assert_eq!(record.path, "main/source/Sources");
        assert_eq!(record.size, 5);
        assert_eq!(
            record.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_ordering_is_by_path() {
        let mut records = vec![
            MetadataFileRecord::for_bytes("main/source/Sources.xz", b"b"),
            MetadataFileRecord::for_bytes("main/binary-amd64/Packages", b"c"),
            MetadataFileRecord::for_bytes("main/source/Sources", b"a"),
        ];
        records.sort();
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "main/binary-amd64/Packages",
                "main/source/Sources",
                "main/source/Sources.xz",
            ]
        );
    }
}
