//! Error types for the APT metadata library.

/// Result type for metadata operations.
pub type Result<T> = std::result::Result<T, MetaError>;

/// Errors that can occur when producing archive metadata files.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// I/O error occurred during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compression or decompression failed.
    #[error("Compression error: {0}")]
    Compression(String),

    /// A source file carried a compressed-file extension we do not handle.
    #[error("Unknown compressed file extension: {0}")]
    UnknownExtension(String),
}
