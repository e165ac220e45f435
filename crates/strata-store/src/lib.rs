//! On-disk storage for the Strata object graph.
//!
//! This crate provides the repository's stores: a content-addressed
//! `ObjectStore` for encoded graph objects, a streaming `PayloadStore` for
//! raw blob content, a `TagStore` of append-only named version streams with
//! a pruning policy, `StoreLayout` for directory structure management, and
//! a full-graph integrity check.

pub mod integrity;
pub mod layout;
pub mod objects;
pub mod payloads;
pub mod prune;
pub mod tags;

pub use integrity::{check_database_integrity, IntegrityFailure, IntegrityReport};
pub use layout::{StoreLayout, STORE_FORMAT_VERSION};
pub use objects::ObjectStore;
pub use payloads::PayloadStore;
pub use prune::{get_prunable_tags, prune_tags, PruneParameters};
pub use tags::TagStore;

use std::path::Path;
use strata_schema::{Digest, SchemaError};
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
/// Calling `fsync()` on the parent directory makes the rename durable on
/// all filesystems and mount configurations.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unknown object: {0}")]
    UnknownObject(Digest),
    #[error("unknown reference: {0}")]
    UnknownReference(String),
    #[error("ambiguous reference '{0}' matches more than one object")]
    AmbiguousReference(String),
    #[error("object corrupt: stored as {expected}, content hashes to {actual}")]
    DigestMismatch { expected: Digest, actual: Digest },
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("tag version {version} already exists in stream '{name}'")]
    TagVersionExists { name: String, version: u64 },
}
