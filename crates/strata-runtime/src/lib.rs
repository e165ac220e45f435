//! Live environment state for Strata.
//!
//! A runtime is a mutable, host-local unit of state: an ordered stack of
//! layer digests plus a writable upper directory capturing local changes.
//! This crate persists runtime state under the repository root and isolates
//! the privileged overlayfs mount behind the `MountBackend` trait so the
//! composition logic is testable without real mounts.

pub mod overlay;
pub mod storage;

pub use overlay::{select_backend, MockBackend, MountBackend, MountRequest, OverlayfsBackend};
pub use storage::{Runtime, RuntimeStorage};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Schema(#[from] strata_schema::SchemaError),
    #[error(transparent)]
    Store(#[from] strata_store::StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("unknown runtime: {0}")]
    UnknownRuntime(String),
    #[error("runtime '{0}' already exists")]
    RuntimeExists(String),
    #[error("mount backend '{0}' is not available on this system")]
    BackendUnavailable(String),
    #[error("overlay mount failed: {0}")]
    MountFailed(String),
}
