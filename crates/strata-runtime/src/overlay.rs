//! Overlay mounting behind a narrow capability interface.
//!
//! Mounting is the only privileged, OS-level side effect in the system, so
//! it is isolated behind [`MountBackend`]. The real backend shells out to
//! `mount -t overlay`; tests substitute [`MockBackend`], which records
//! mounts in memory.

use crate::RuntimeError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tracing::debug;

/// Everything needed to compose one live view.
///
/// `lower_dirs` is ordered bottom-to-top: later entries shadow earlier ones,
/// and the upper dir shadows them all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub lower_dirs: Vec<PathBuf>,
    pub upper_dir: PathBuf,
    pub work_dir: PathBuf,
    pub target: PathBuf,
    pub editable: bool,
}

pub trait MountBackend: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    fn mount(&self, request: &MountRequest) -> Result<(), RuntimeError>;

    /// Replace an existing mount, e.g. after a digest was pushed onto the
    /// stack. Failures are fatal to the caller's operation; a partial
    /// remount corrupts the live view.
    fn remount(&self, request: &MountRequest) -> Result<(), RuntimeError> {
        self.unmount(&request.target)?;
        self.mount(request)
    }

    fn unmount(&self, target: &Path) -> Result<(), RuntimeError>;
}

pub fn select_backend(name: &str) -> Result<Box<dyn MountBackend>, RuntimeError> {
    match name {
        "overlayfs" => Ok(Box::new(OverlayfsBackend)),
        "mock" => Ok(Box::new(MockBackend::new())),
        other => Err(RuntimeError::BackendUnavailable(other.to_owned())),
    }
}

/// The real thing: kernel overlayfs via the `mount` binary. Privileged.
pub struct OverlayfsBackend;

impl OverlayfsBackend {
    fn options(request: &MountRequest) -> String {
        // The kernel expects lowerdir entries topmost-first.
        let lowers: Vec<&str> = request
            .lower_dirs
            .iter()
            .rev()
            .filter_map(|p| p.to_str())
            .collect();
        let mut opts = format!(
            "lowerdir={},upperdir={},workdir={}",
            lowers.join(":"),
            request.upper_dir.display(),
            request.work_dir.display(),
        );
        if !request.editable {
            opts.push_str(",ro");
        }
        opts
    }
}

impl MountBackend for OverlayfsBackend {
    fn name(&self) -> &str {
        "overlayfs"
    }

    fn available(&self) -> bool {
        std::fs::read_to_string("/proc/filesystems")
            .map(|fs| fs.lines().any(|l| l.trim_end().ends_with("overlay")))
            .unwrap_or(false)
    }

    fn mount(&self, request: &MountRequest) -> Result<(), RuntimeError> {
        let options = Self::options(request);
        debug!(target = %request.target.display(), %options, "mounting overlay");
        let output = Command::new("mount")
            .args(["-t", "overlay", "overlay", "-o", &options])
            .arg(&request.target)
            .output()?;
        if !output.status.success() {
            return Err(RuntimeError::MountFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), RuntimeError> {
        let output = Command::new("umount").arg(target).output()?;
        if !output.status.success() {
            return Err(RuntimeError::MountFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ));
        }
        Ok(())
    }
}

/// In-memory mount table for tests.
#[derive(Default)]
pub struct MockBackend {
    mounts: Mutex<HashMap<PathBuf, MountRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_mounted(&self, target: &Path) -> bool {
        self.mounts
            .lock()
            .map(|m| m.contains_key(target))
            .unwrap_or(false)
    }

    /// The request currently mounted at `target`, if any.
    pub fn mounted_request(&self, target: &Path) -> Option<MountRequest> {
        self.mounts.lock().ok()?.get(target).cloned()
    }
}

impl MountBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn available(&self) -> bool {
        true
    }

    fn mount(&self, request: &MountRequest) -> Result<(), RuntimeError> {
        let mut mounts = self
            .mounts
            .lock()
            .map_err(|e| RuntimeError::MountFailed(format!("mutex poisoned: {e}")))?;
        if mounts.contains_key(&request.target) {
            return Err(RuntimeError::MountFailed(format!(
                "target already mounted: {}",
                request.target.display()
            )));
        }
        mounts.insert(request.target.clone(), request.clone());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), RuntimeError> {
        let mut mounts = self
            .mounts
            .lock()
            .map_err(|e| RuntimeError::MountFailed(format!("mutex poisoned: {e}")))?;
        if mounts.remove(target).is_none() {
            return Err(RuntimeError::MountFailed(format!(
                "target not mounted: {}",
                target.display()
            )));
        }
        Ok(())
    }
}
