//! Error types for the publishing engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;

/// Result type for publishing operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Errors that can abort a repository's publish cycle.
#[derive(Debug, Error)]
pub enum PublishError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine is misconfigured (missing keyring, bad paths, ...).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The external metadata hook failed.
    #[error("External hook failed: {0}")]
    Hook(String),

    /// Supplemental metadata did not pass validation.
    #[error("Supplemental metadata validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// Signing the release descriptor failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// The atomic path exchange failed; the tree state must be inspected
    /// before retrying.
    #[error("Atomic swap of {} and {} failed: {}", .staged.display(), .published.display(), .source)]
    Swap {
        /// The staged in-progress tree.
        staged: PathBuf,
        /// The published tree the swap targeted.
        published: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// Another publish cycle already holds this repository's lock.
    #[error("Repository {0} is already being published by another process")]
    LockContention(String),

    /// A catalog query or flag update failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A metadata format operation failed.
    #[error("Metadata error: {0}")]
    Meta(#[from] apt_meta::MetaError),
}
