//! Compression support for archive metadata files.

use std::io::{Read, Write};
use std::path::Path;

use crate::{MetaError, Result};

/// Supported compression encodings for archive metadata files.
///
/// Xz is the primary, high-ratio encoding; gzip is kept for clients that
/// cannot consume xz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// XZ (LZMA2) compression.
    Xz,
}

impl Compression {
    /// Get the file extension for this encoding, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Xz => ".xz",
        }
    }

    /// Infer the encoding of an existing file from its extension.
    pub fn from_path(path: &Path) -> Compression {
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Compression::Gzip,
            Some("xz") => Compression::Xz,
            _ => Compression::None,
        }
    }

    /// Compress data using this encoding.
    ///
    /// Output is byte-deterministic for identical input, so checksums over
    /// compressed siblings are reproducible across publish cycles.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data)?;
                encoder
                    .finish()
                    .map_err(|e| MetaError::Compression(e.to_string()))
            }
            Compression::Xz => {
                let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
                encoder.write_all(data)?;
                encoder
                    .finish()
                    .map_err(|e| MetaError::Compression(e.to_string()))
            }
        }
    }

    /// Decompress data using this encoding.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => {
                let mut decompressed = Vec::new();
                let mut decoder = flate2::read::GzDecoder::new(data);
                decoder.read_to_end(&mut decompressed)?;
                Ok(decompressed)
            }
            Compression::Xz => {
                let mut decompressed = Vec::new();
                let mut decoder = xz2::read::XzDecoder::new(data);
                decoder.read_to_end(&mut decompressed)?;
                Ok(decompressed)
            }
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Xz => write!(f, "xz"),
        }
    }
}
