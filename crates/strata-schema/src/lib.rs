//! Data model for the Strata content-addressable object graph.
//!
//! This crate defines the identity primitive (`Digest`), the stable binary
//! encoding used for hashing and on-disk storage, the typed object graph
//! nodes (`Blob`, `Manifest`, `Layer`, `Platform`), the manifest/diff engine
//! that turns directory trees into deterministic structural snapshots, and
//! the reference grammars (`TagSpec`, `EnvSpec`) used to name them.

pub mod diff;
pub mod digest;
pub mod encoding;
pub mod env;
pub mod manifest;
pub mod object;
pub mod tag;

pub use diff::{compute_diff, Diff, DiffMode};
pub use digest::{Digest, PartialDigest, DIGEST_SIZE};
pub use env::{EnvSpec, EnvSpecItem};
pub use manifest::{compute_manifest, stack_manifests, Entry, EntryKind, Manifest};
pub use object::{Blob, Layer, Object, ObjectKind, Platform};
pub use tag::{Tag, TagSpec};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
    #[error("invalid tag spec '{spec}': {reason}")]
    InvalidTag { spec: String, reason: String },
    #[error("invalid env spec '{spec}': {reason}")]
    InvalidEnvSpec { spec: String, reason: String },
    #[error("unsupported special file: {}", .0.display())]
    UnsupportedFileType(PathBuf),
    #[error("invalid object encoding: {0}")]
    InvalidEncoding(String),
}
