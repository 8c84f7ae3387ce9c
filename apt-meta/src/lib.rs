//! # APT Metadata Library
//!
//! Primitives for producing the metadata files of a Debian-style package
//! archive: control-file stanzas, compressed index encodings, and checksum
//! records suitable for a Release manifest.
//!
//! The library is deliberately format-only. It knows how to render a stanza,
//! how to persist an index file together with its compressed siblings, and
//! how to checksum what it wrote; it does not know what a suite or a package
//! is. Higher layers feed it text and collect [`MetadataFileRecord`]s.
//!
//! ## Example
//!
//! ```rust
//! use apt_meta::{write_compressed_files, Compression};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let records = write_compressed_files(
//!     dir.path(),
//!     "main/source",
//!     "Sources",
//!     "Package: hello\nVersion: 1.0\n",
//!     &[Compression::Xz],
//! )?;
//! assert_eq!(records.len(), 2); // plain + .xz
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod error;
pub mod record;
pub mod stanza;
pub mod writer;

pub use compression::Compression;
pub use error::{MetaError, Result};
pub use record::{sha256_hex, MetadataFileRecord};
pub use stanza::{join_stanzas, ControlStanza};
pub use writer::{import_metadata_file, persist_bytes, write_compressed_files};

/// Compression encodings applied when re-emitting imported metadata files
/// and no explicit encoding is requested.
pub const DEFAULT_COMPRESSIONS: &[Compression] = &[Compression::Xz, Compression::Gzip];
