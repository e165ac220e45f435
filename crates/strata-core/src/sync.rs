//! Cross-repository object graph sync.
//!
//! Syncing copies the transitive closure of a reference from one repository
//! to another, skipping anything the destination already holds. Every node
//! is re-checked on each run, so an interrupted sync resumes cleanly by
//! running it again.

use crate::config::RemotesConfig;
use crate::repository::Repository;
use crate::CoreError;
use tracing::{debug, info};

use strata_schema::{Digest, EnvSpecItem, Object};
use strata_store::StoreError;

/// Copy the object graph rooted at `reference` from `src` into `dest`.
///
/// When the reference names a tag, the tag itself is carried over too,
/// preserving its version, user and time.
pub fn sync_ref(reference: &str, src: &Repository, dest: &Repository) -> Result<Object, CoreError> {
    let digest = src.resolve_ref_to_digest(reference)?;
    let object = sync_object(src, dest, &digest)?;

    if let Ok(EnvSpecItem::TagSpec(spec)) = reference.parse() {
        let tag = src.tags().resolve_tag(&spec)?;
        match dest.tags().push_raw_tag(&tag) {
            Ok(()) | Err(StoreError::TagVersionExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    info!(%reference, %digest, "synced reference");
    Ok(object)
}

/// Push a reference from `repo` to the named remote from its config.
pub fn push_ref(reference: &str, repo: &Repository, remote: &str) -> Result<Object, CoreError> {
    let dest = open_remote(repo, remote)?;
    sync_ref(reference, repo, &dest)
}

/// Pull a reference from the named remote into `repo`.
pub fn pull_ref(reference: &str, repo: &Repository, remote: &str) -> Result<Object, CoreError> {
    let src = open_remote(repo, remote)?;
    sync_ref(reference, &src, repo)
}

fn open_remote(repo: &Repository, remote: &str) -> Result<Repository, CoreError> {
    let config = RemotesConfig::load(&repo.layout().config_file())?;
    let path = config
        .remote(remote)
        .ok_or_else(|| CoreError::UnknownRemote(remote.to_owned()))?;
    Repository::open(path)
}

fn sync_object(src: &Repository, dest: &Repository, digest: &Digest) -> Result<Object, CoreError> {
    if dest.objects().has_object(digest) {
        return Ok(dest.objects().read_object(digest)?);
    }

    let object = src.objects().read_object(digest)?;
    for child in object.child_objects() {
        sync_object(src, dest, &child)?;
    }
    // Payload lands before the blob object that names it.
    if let Object::Blob(blob) = &object {
        if !dest.payloads().has_payload(&blob.payload) {
            let reader = src.payloads().open_payload(&blob.payload)?;
            dest.payloads().write_payload(reader)?;
        }
    }
    dest.objects().write_object(&object)?;
    debug!(%digest, kind = %object.kind(), "copied object");
    Ok(object)
}
