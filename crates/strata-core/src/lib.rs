//! High-level repository operations for Strata.
//!
//! This crate ties the schema and store layers together into the
//! `Repository` facade and implements the operations built on top of it:
//! committing directories and runtimes, rendering manifests for overlay
//! mounting, cross-repository sync, tag-and-runtime-rooted garbage
//! collection, and store locking.

pub mod clean;
pub mod commit;
pub mod concurrency;
pub mod config;
pub mod render;
pub mod repository;
pub mod sync;

pub use clean::{
    clean_untagged_objects, get_all_attached_objects, get_all_unattached_objects,
    get_all_unattached_payloads, CleanResult,
};
pub use commit::{commit_layer, commit_platform};
pub use concurrency::{install_signal_handler, shutdown_requested, StoreLock};
pub use config::RemotesConfig;
pub use render::{render_manifest, resolve_runtime_layers};
pub use repository::Repository;
pub use sync::{pull_ref, push_ref, sync_ref};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Schema(#[from] strata_schema::SchemaError),
    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),
    #[error("runtime error: {0}")]
    Runtime(#[from] strata_runtime::RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("nothing to commit: no local changes present")]
    NothingToCommit,
    #[error("object {digest} is a {found}, expected a {expected}")]
    WrongObjectKind {
        digest: strata_schema::Digest,
        expected: strata_schema::ObjectKind,
        found: strata_schema::ObjectKind,
    },
    #[error("unknown remote: {0}")]
    UnknownRemote(String),
    #[error("operation interrupted")]
    Interrupted,
}
