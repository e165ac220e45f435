//! Persistent per-runtime state under the repository's `runtimes` directory.

use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use strata_schema::Digest;
use strata_store::StoreLayout;

const CONFIG_FILE: &str = "config.json";
const UPPER_DIR: &str = "upper";
const WORK_DIR: &str = "work";

/// The durable portion of a runtime's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub stack: Vec<Digest>,
    pub editable: bool,
}

/// Creates, loads and removes runtimes under a store layout.
pub struct RuntimeStorage {
    layout: StoreLayout,
}

impl RuntimeStorage {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Allocate a new runtime: fresh id, empty stack, empty upper dir.
    pub fn create_runtime(&self) -> Result<Runtime, RuntimeError> {
        let id = generate_id();
        let root = self.layout.runtimes_dir().join(&id);
        if root.exists() {
            return Err(RuntimeError::RuntimeExists(id));
        }
        fs::create_dir_all(root.join(UPPER_DIR))?;
        fs::create_dir_all(root.join(WORK_DIR))?;

        let runtime = Runtime {
            id,
            root,
            config: RuntimeConfig::default(),
        };
        runtime.save()?;
        debug!(id = %runtime.id, "created runtime");
        Ok(runtime)
    }

    pub fn read_runtime(&self, id: &str) -> Result<Runtime, RuntimeError> {
        let root = self.layout.runtimes_dir().join(id);
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(RuntimeError::UnknownRuntime(id.to_owned()));
        }
        let config: RuntimeConfig = serde_json::from_str(&fs::read_to_string(config_path)?)?;
        Ok(Runtime {
            id: id.to_owned(),
            root,
            config,
        })
    }

    /// Tear a runtime down, removing its upper dir contents with it.
    pub fn remove_runtime(&self, id: &str) -> Result<(), RuntimeError> {
        let root = self.layout.runtimes_dir().join(id);
        if !root.join(CONFIG_FILE).exists() {
            return Err(RuntimeError::UnknownRuntime(id.to_owned()));
        }
        fs::remove_dir_all(root)?;
        Ok(())
    }

    /// All runtimes currently present, sorted by id. Restartable.
    pub fn iter_runtimes(&self) -> Result<Vec<Runtime>, RuntimeError> {
        let dir = self.layout.runtimes_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut runtimes = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(ToOwned::to_owned) else {
                continue;
            };
            if entry.path().join(CONFIG_FILE).exists() {
                runtimes.push(self.read_runtime(&name)?);
            }
        }
        runtimes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(runtimes)
    }
}

/// One live environment: an ordered digest stack plus a writable upper dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    id: String,
    root: PathBuf,
    config: RuntimeConfig,
}

impl Runtime {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The writable layer capturing local additions, modifications and
    /// whiteouts.
    pub fn upper_dir(&self) -> PathBuf {
        self.root.join(UPPER_DIR)
    }

    /// Scratch space required by overlayfs, sibling to the upper dir.
    pub fn work_dir(&self) -> PathBuf {
        self.root.join(WORK_DIR)
    }

    pub fn stack(&self) -> &[Digest] {
        &self.config.stack
    }

    /// Append a digest to the top of the stack. The caller must remount for
    /// the new layer to become visible beneath the upper dir.
    pub fn push_digest(&mut self, digest: Digest) -> Result<(), RuntimeError> {
        self.config.stack.push(digest);
        self.save()
    }

    /// Replace the whole stack at once.
    pub fn reset_stack(&mut self, stack: Vec<Digest>) -> Result<(), RuntimeError> {
        self.config.stack = stack;
        self.save()
    }

    pub fn is_editable(&self) -> bool {
        self.config.editable
    }

    pub fn set_editable(&mut self, editable: bool) -> Result<(), RuntimeError> {
        self.config.editable = editable;
        self.save()
    }

    /// Whether the upper dir holds any local changes.
    pub fn is_dirty(&self) -> Result<bool, RuntimeError> {
        let upper = self.upper_dir();
        if !upper.exists() {
            return Ok(false);
        }
        Ok(fs::read_dir(upper)?.next().is_some())
    }

    /// Discard all local changes, returning the runtime to a clean state
    /// with the same stack.
    pub fn reset(&self) -> Result<(), RuntimeError> {
        let upper = self.upper_dir();
        for entry in fs::read_dir(&upper)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn save(&self) -> Result<(), RuntimeError> {
        let data = serde_json::to_string_pretty(&self.config)?;
        let tmp = self.root.join(format!("{CONFIG_FILE}.tmp"));
        fs::write(&tmp, data)?;
        fs::rename(tmp, self.root.join(CONFIG_FILE))?;
        Ok(())
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A short unique id: hash of process id, creation time and an in-process
/// counter, so two runtimes created in the same nanosecond still differ.
fn generate_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = format!("{}-{nanos}-{seq}", std::process::id());
    blake3::hash(seed.as_bytes()).to_hex()[..16].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> (tempfile::TempDir, RuntimeStorage) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.initialize().unwrap();
        (dir, RuntimeStorage::new(layout))
    }

    #[test]
    fn create_read_roundtrip() {
        let (_dir, storage) = test_storage();
        let rt = storage.create_runtime().unwrap();
        let again = storage.read_runtime(rt.id()).unwrap();
        assert_eq!(rt, again);
        assert!(again.stack().is_empty());
        assert!(!again.is_editable());
    }

    #[test]
    fn fresh_ids_are_unique() {
        let (_dir, storage) = test_storage();
        let a = storage.create_runtime().unwrap();
        let b = storage.create_runtime().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(storage.iter_runtimes().unwrap().len(), 2);
    }

    #[test]
    fn read_unknown_fails() {
        let (_dir, storage) = test_storage();
        assert!(matches!(
            storage.read_runtime("no-such-id"),
            Err(RuntimeError::UnknownRuntime(_))
        ));
    }

    #[test]
    fn push_digest_persists() {
        let (_dir, storage) = test_storage();
        let mut rt = storage.create_runtime().unwrap();
        let d = Digest::of_bytes(b"layer");
        rt.push_digest(d).unwrap();

        let again = storage.read_runtime(rt.id()).unwrap();
        assert_eq!(again.stack(), &[d]);
    }

    #[test]
    fn editable_toggle_persists() {
        let (_dir, storage) = test_storage();
        let mut rt = storage.create_runtime().unwrap();
        rt.set_editable(true).unwrap();
        assert!(storage.read_runtime(rt.id()).unwrap().is_editable());
    }

    #[test]
    fn dirty_tracks_upper_dir_contents() {
        let (_dir, storage) = test_storage();
        let rt = storage.create_runtime().unwrap();
        assert!(!rt.is_dirty().unwrap());

        fs::write(rt.upper_dir().join("new.txt"), b"local change").unwrap();
        assert!(rt.is_dirty().unwrap());

        rt.reset().unwrap();
        assert!(!rt.is_dirty().unwrap());
    }

    #[test]
    fn reset_keeps_stack() {
        let (_dir, storage) = test_storage();
        let mut rt = storage.create_runtime().unwrap();
        let d = Digest::of_bytes(b"base");
        rt.push_digest(d).unwrap();
        fs::create_dir_all(rt.upper_dir().join("sub")).unwrap();
        fs::write(rt.upper_dir().join("sub/f"), b"x").unwrap();

        rt.reset().unwrap();
        assert!(!rt.is_dirty().unwrap());
        assert_eq!(rt.stack(), &[d]);
    }

    #[test]
    fn remove_runtime_deletes_state() {
        let (_dir, storage) = test_storage();
        let rt = storage.create_runtime().unwrap();
        let id = rt.id().to_owned();
        storage.remove_runtime(&id).unwrap();
        assert!(storage.read_runtime(&id).is_err());
        assert!(matches!(
            storage.remove_runtime(&id),
            Err(RuntimeError::UnknownRuntime(_))
        ));
    }
}
