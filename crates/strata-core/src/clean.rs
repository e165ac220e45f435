//! Garbage collection of unreachable objects and payloads.

use crate::concurrency::{shutdown_requested, StoreLock};
use crate::repository::Repository;
use crate::CoreError;
use std::collections::HashSet;
use std::fs;
use tracing::{debug, info};

use strata_schema::{Digest, Object};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CleanResult {
    pub objects_removed: usize,
    pub payloads_removed: usize,
}

/// The reachable set: the transitive closure of every tag's every retained
/// version's target plus every runtime's stack.
pub fn get_all_attached_objects(repo: &Repository) -> Result<HashSet<Digest>, CoreError> {
    let mut pending: Vec<Digest> = Vec::new();
    for (_, tag) in repo.tags().iter_tags()? {
        pending.push(tag.target);
    }
    for runtime in repo.runtimes().iter_runtimes()? {
        pending.extend_from_slice(runtime.stack());
    }

    let mut attached = HashSet::new();
    while let Some(digest) = pending.pop() {
        if !attached.insert(digest) {
            continue;
        }
        // A dangling or unreadable reference contributes nothing further;
        // the integrity check is the place that reports it.
        if let Ok(object) = repo.objects().read_object(&digest) {
            pending.extend(object.child_objects());
        }
    }
    Ok(attached)
}

pub fn get_all_unattached_objects(repo: &Repository) -> Result<Vec<Digest>, CoreError> {
    let attached = get_all_attached_objects(repo)?;
    Ok(repo
        .objects()
        .iter_digests()?
        .into_iter()
        .filter(|d| !attached.contains(d))
        .collect())
}

pub fn get_all_unattached_payloads(repo: &Repository) -> Result<Vec<Digest>, CoreError> {
    let attached = get_all_attached_objects(repo)?;
    let mut attached_payloads = HashSet::new();
    for digest in &attached {
        if let Ok(Object::Blob(blob)) = repo.objects().read_object(digest) {
            attached_payloads.insert(blob.payload);
        }
    }
    Ok(repo
        .payloads()
        .iter_digests()?
        .into_iter()
        .filter(|d| !attached_payloads.contains(d))
        .collect())
}

/// Delete everything unreachable from any tag or runtime.
///
/// The reachable snapshot is computed up front, under the store lock, before
/// any deletion begins. Objects go first, then payloads, since a payload's
/// only referrer is a blob object. Ctrl-C between deletions stops the run
/// cleanly; everything already deleted stays deleted and a re-run finishes
/// the rest.
pub fn clean_untagged_objects(repo: &Repository) -> Result<CleanResult, CoreError> {
    let _lock = StoreLock::acquire(&repo.layout().lock_file())?;

    let objects = get_all_unattached_objects(repo)?;
    let payloads = get_all_unattached_payloads(repo)?;
    let mut result = CleanResult::default();

    for digest in &objects {
        if shutdown_requested() {
            return Err(CoreError::Interrupted);
        }
        repo.objects().remove_object(digest)?;
        // A removed manifest's render is dead weight with it.
        let render = repo.layout().renders_dir().join(digest.to_hex());
        if render.exists() {
            fs::remove_dir_all(render)?;
        }
        debug!(%digest, "removed object");
        result.objects_removed += 1;
    }
    for digest in &payloads {
        if shutdown_requested() {
            return Err(CoreError::Interrupted);
        }
        repo.payloads().remove_payload(digest)?;
        debug!(%digest, "removed payload");
        result.payloads_removed += 1;
    }

    info!(
        objects = result.objects_removed,
        payloads = result.payloads_removed,
        "store cleaned"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::create(dir.path()).unwrap();
        (dir, repo)
    }

    fn commit_layer_digest(repo: &Repository, content: &[u8]) -> Digest {
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("file"), content).unwrap();
        let manifest = repo.commit_dir(src.path()).unwrap();
        let layer = repo.create_layer(manifest.digest()).unwrap();
        Object::from(layer).digest().unwrap()
    }

    #[test]
    fn tagged_graph_is_fully_attached() {
        let (_dir, repo) = test_repo();
        let layer = commit_layer_digest(&repo, b"keep me");
        repo.push_tag("keep", &layer).unwrap();

        let attached = get_all_attached_objects(&repo).unwrap();
        // Layer, manifest, blob.
        assert_eq!(attached.len(), 3);
        assert!(get_all_unattached_objects(&repo).unwrap().is_empty());
        assert!(get_all_unattached_payloads(&repo).unwrap().is_empty());
    }

    #[test]
    fn untagged_graph_is_unattached() {
        let (_dir, repo) = test_repo();
        commit_layer_digest(&repo, b"orphan");
        assert_eq!(get_all_unattached_objects(&repo).unwrap().len(), 3);
        assert_eq!(get_all_unattached_payloads(&repo).unwrap().len(), 1);
    }

    #[test]
    fn clean_removes_only_unreachable() {
        let (_dir, repo) = test_repo();
        let kept = commit_layer_digest(&repo, b"keep me");
        repo.push_tag("keep", &kept).unwrap();
        commit_layer_digest(&repo, b"orphan");

        let result = clean_untagged_objects(&repo).unwrap();
        assert_eq!(result.objects_removed, 3);
        assert_eq!(result.payloads_removed, 1);

        // The tagged graph still resolves completely.
        let layer = repo.read_layer(&kept).unwrap();
        let manifest = repo.read_manifest(&layer.manifest).unwrap();
        for blob in manifest.child_objects() {
            let blob = repo.read_blob(&blob).unwrap();
            assert!(repo.payloads().has_payload(&blob.payload));
        }
    }

    #[test]
    fn old_tag_versions_stay_attached() {
        let (_dir, repo) = test_repo();
        let old = commit_layer_digest(&repo, b"old version");
        let new = commit_layer_digest(&repo, b"new version");
        repo.push_tag("env", &old).unwrap();
        repo.push_tag("env", &new).unwrap();

        let result = clean_untagged_objects(&repo).unwrap();
        assert_eq!(result, CleanResult::default());
        assert!(repo.read_layer(&old).is_ok());
    }

    #[test]
    fn runtime_stacks_keep_objects_alive() {
        let (_dir, repo) = test_repo();
        let layer = commit_layer_digest(&repo, b"in use");
        let mut runtime = repo.runtimes().create_runtime().unwrap();
        runtime.push_digest(layer).unwrap();

        clean_untagged_objects(&repo).unwrap();
        assert!(repo.read_layer(&layer).is_ok());

        repo.runtimes().remove_runtime(runtime.id()).unwrap();
        let result = clean_untagged_objects(&repo).unwrap();
        assert_eq!(result.objects_removed, 3);
    }

    #[test]
    fn clean_drops_dead_renders() {
        let (_dir, repo) = test_repo();
        let layer = commit_layer_digest(&repo, b"rendered");
        let manifest = repo.read_layer(&layer).unwrap().manifest;
        let rendered = crate::render::render_manifest(&repo, &manifest).unwrap();
        assert!(rendered.exists());

        clean_untagged_objects(&repo).unwrap();
        assert!(!rendered.exists());
    }

    #[test]
    fn shared_blobs_survive_partial_clean() {
        let (_dir, repo) = test_repo();
        // Two layers over identical content share blob and payload.
        let kept = commit_layer_digest(&repo, b"shared");
        let src = tempfile::tempdir().unwrap();
        fs::write(src.path().join("file"), b"shared").unwrap();
        fs::write(src.path().join("extra"), b"only here").unwrap();
        let manifest = repo.commit_dir(src.path()).unwrap();
        repo.create_layer(manifest.digest()).unwrap();

        repo.push_tag("keep", &kept).unwrap();
        clean_untagged_objects(&repo).unwrap();

        let layer = repo.read_layer(&kept).unwrap();
        let kept_manifest = repo.read_manifest(&layer.manifest).unwrap();
        let entry = kept_manifest.get_path("file").unwrap();
        assert!(repo.payloads().has_payload(&repo.read_blob(&entry.object).unwrap().payload));
    }
}
