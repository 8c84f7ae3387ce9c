//! Archive metadata publishing engine.
//!
//! Turns a catalog snapshot of packages, suites, components and
//! architectures into a signed, checksum-verified `dists` tree that is
//! published atomically: concurrent readers always see a complete,
//! self-consistent repository, never a partial update.
//!
//! The engine is built around a handful of collaborator seams: the package
//! [`catalog`](crate::catalog::Catalog), the
//! [`signer`](crate::signing::Signer) and the supplemental-metadata
//! [`validator`](crate::dep11::SupplementValidator). The publishing logic
//! itself stays independent of any particular database, keyring or
//! validation tooling.

pub mod catalog;
pub mod config;
pub mod dep11;
pub mod error;
pub mod fsutil;
pub mod indices;
pub mod lock;
pub mod publish;
pub mod release;
pub mod signing;

pub use catalog::{Catalog, MemoryCatalog};
pub use config::PublisherConfig;
pub use error::{PublishError, PublishResult};
pub use publish::ArchivePublisher;
pub use signing::{GpgSigner, SignMode, Signer};
