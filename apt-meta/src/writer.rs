//! Persisting metadata files together with their checksum records.
//!
//! Every write goes through a temporary file that is persisted into place
//! only after it is fully flushed, so a record is never returned for a file
//! that did not make it to disk intact.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::{Compression, MetadataFileRecord, Result, DEFAULT_COMPRESSIONS};

fn relative_name(subdir: &str, basename: &str) -> String {
    if subdir.is_empty() {
        basename.to_string()
    } else {
        format!("{}/{}", subdir, basename)
    }
}

/// Write bytes to `root/subdir/name` atomically and return the checksum
/// record for the written file.
pub fn persist_bytes(root: &Path, subdir: &str, name: &str, data: &[u8]) -> Result<MetadataFileRecord> {
    let dir = root.join(subdir);
    fs::create_dir_all(&dir)?;
    let mut tmpf = NamedTempFile::new_in(&dir)?;
    tmpf.write_all(data)?;
    tmpf.flush()?;
    tmpf.persist(dir.join(name)).map_err(|e| e.error)?;
    Ok(MetadataFileRecord::for_bytes(
        relative_name(subdir, name),
        data,
    ))
}

/// Write an archive metadata file plus one compressed sibling per requested
/// encoding.
///
/// The canonical (uncompressed) file is always written; its record carries
/// the checksum over the canonical bytes. Each compressed sibling gets a
/// record with the checksum over its on-disk bytes.
pub fn write_compressed_files(
    root: &Path,
    subdir: &str,
    basename: &str,
    data: &str,
    encodings: &[Compression],
) -> Result<Vec<MetadataFileRecord>> {
    let data_bytes = data.as_bytes();
    let mut records = Vec::new();
    records.push(persist_bytes(root, subdir, basename, data_bytes)?);

    for &encoding in encodings {
        if encoding == Compression::None {
            continue;
        }
        let compressed = encoding.compress(data_bytes)?;
        let name = format!("{}{}", basename, encoding.extension());
        records.push(persist_bytes(root, subdir, &name, &compressed)?);
    }

    Ok(records)
}

/// Import an externally produced metadata file, checksum it and re-emit it
/// in the requested encoding(s).
///
/// The source's encoding is inferred from its file extension and the content
/// decompressed to canonical bytes; the canonical checksum is recorded
/// against the plain path so every imported file, however it originated, is
/// verifiable against its decompressed content. Only the compressed
/// rendition(s) are written into the tree.
pub fn import_metadata_file(
    root: &Path,
    subdir: &str,
    basename: &str,
    source: &Path,
    only_encoding: Option<Compression>,
) -> Result<Vec<MetadataFileRecord>> {
    let raw = fs::read(source)?;
    let data = Compression::from_path(source).decompress(&raw)?;

    let mut records = Vec::new();
    records.push(MetadataFileRecord::for_bytes(
        relative_name(subdir, basename),
        &data,
    ));

    let encodings: &[Compression] = match only_encoding {
        Some(ref encoding) => std::slice::from_ref(encoding),
        None => DEFAULT_COMPRESSIONS,
    };
    for &encoding in encodings {
        if encoding == Compression::None {
            continue;
        }
        let compressed = encoding.compress(&data)?;
        let name = format!("{}{}", basename, encoding.extension());
        records.push(persist_bytes(root, subdir, &name, &compressed)?);
    }

    Ok(records)
}
