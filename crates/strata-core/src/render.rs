//! Materializing stored manifests as real directory trees.
//!
//! Overlay mounting needs each layer as an on-disk lowerdir. A render
//! hard-links payload files into `renders/<manifest digest>` so the same
//! content is never duplicated, and publishes the finished tree with a
//! rename so a partially built render is never observable under its digest.

use crate::repository::Repository;
use crate::CoreError;
use std::fs;
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tracing::debug;

use strata_schema::{Digest, EntryKind, Object};

/// Render a stored manifest under `renders/<digest>`, returning the path.
/// Idempotent: an existing render is returned as-is.
pub fn render_manifest(repo: &Repository, manifest: &Digest) -> Result<PathBuf, CoreError> {
    let renders = repo.layout().renders_dir();
    let dest = renders.join(manifest.to_hex());
    if dest.exists() {
        return Ok(dest);
    }

    let loaded = repo.read_manifest(manifest)?;
    let staging = renders.join(format!("{}.work-{}", manifest.to_hex(), std::process::id()));
    fs::create_dir_all(&staging)?;

    let entries = loaded.walk();
    for (path, entry) in &entries {
        let target = staging.join(path.trim_start_matches('/'));
        match entry.kind {
            EntryKind::Tree => {
                fs::create_dir_all(&target)?;
            }
            EntryKind::Blob => {
                let blob = repo.read_blob(&entry.object)?;
                let payload = repo.layout().payloads_dir().join(blob.payload.to_hex());
                fs::hard_link(&payload, &target)?;
                fs::set_permissions(&target, fs::Permissions::from_mode(entry.mode))?;
            }
            EntryKind::Symlink => {
                let mut text = String::new();
                repo.payloads()
                    .open_payload(&entry.object)?
                    .read_to_string(&mut text)?;
                std::os::unix::fs::symlink(text, &target)?;
            }
            // A masked path is simply absent from the rendered tree; masks
            // only take effect when manifests are stacked logically.
            EntryKind::Mask => {}
        }
    }
    // Directory modes go on last, children-first, so a read-only tree does
    // not block its own construction.
    for (path, entry) in entries.iter().rev() {
        if entry.kind == EntryKind::Tree {
            let target = staging.join(path.trim_start_matches('/'));
            fs::set_permissions(&target, fs::Permissions::from_mode(entry.mode))?;
        }
    }

    match fs::rename(&staging, &dest) {
        Ok(()) => {}
        // Lost a race with a concurrent render of the same manifest.
        Err(_) if dest.exists() => {
            fs::remove_dir_all(&staging)?;
        }
        Err(e) => return Err(CoreError::Io(e)),
    }
    debug!(digest = %manifest, "rendered manifest");
    Ok(dest)
}

/// Map a runtime stack to rendered lowerdir paths, bottom-to-top.
///
/// Platforms are expanded depth-first in stack order; layers render their
/// manifest; a bare manifest digest renders directly.
pub fn resolve_runtime_layers(
    repo: &Repository,
    stack: &[Digest],
) -> Result<Vec<PathBuf>, CoreError> {
    let mut paths = Vec::new();
    for digest in stack {
        match repo.objects().read_object(digest)? {
            Object::Platform(platform) => {
                paths.extend(resolve_runtime_layers(repo, &platform.stack)?);
            }
            Object::Layer(layer) => {
                paths.push(render_manifest(repo, &layer.manifest)?);
            }
            Object::Manifest(manifest) => {
                paths.push(render_manifest(repo, &manifest.digest())?);
            }
            other => {
                return Err(CoreError::WrongObjectKind {
                    digest: *digest,
                    expected: strata_schema::ObjectKind::Layer,
                    found: other.kind(),
                });
            }
        }
    }
    Ok(paths)
}
