use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::Write;
use strata_schema::{Digest, Object, PartialDigest};
use tempfile::NamedTempFile;

/// Content-addressable store of encoded graph objects.
///
/// Objects are stored as files named by their digest. Writes are atomic via
/// `NamedTempFile` — the digest filename is only published once the content
/// is fully flushed — and reads verify integrity by re-deriving the digest
/// from the decoded object.
pub struct ObjectStore {
    layout: StoreLayout,
}

impl ObjectStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Store an object and return its digest. Idempotent — content
    /// addressing means writing the same logical object twice lands on the
    /// same file, and existing files are skipped.
    pub fn write_object(&self, obj: &Object) -> Result<Digest, StoreError> {
        let digest = obj.digest()?;
        let dir = self.layout.objects_dir();
        let dest = dir.join(digest.to_hex());

        if dest.exists() {
            return Ok(digest);
        }

        let mut tmp = NamedTempFile::new_in(&dir)?;
        obj.encode(&mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok(digest)
    }

    /// Retrieve an object by digest, verifying integrity on read.
    pub fn read_object(&self, digest: &Digest) -> Result<Object, StoreError> {
        let path = self.layout.objects_dir().join(digest.to_hex());
        if !path.exists() {
            return Err(StoreError::UnknownObject(*digest));
        }
        let data = fs::read(&path)?;
        let obj = Object::decode(&mut data.as_slice())?;

        let actual = obj.digest()?;
        if actual != *digest {
            return Err(StoreError::DigestMismatch {
                expected: *digest,
                actual,
            });
        }

        Ok(obj)
    }

    pub fn has_object(&self, digest: &Digest) -> bool {
        self.layout.objects_dir().join(digest.to_hex()).exists()
    }

    pub fn remove_object(&self, digest: &Digest) -> Result<(), StoreError> {
        let path = self.layout.objects_dir().join(digest.to_hex());
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// All stored digests, sorted. Restartable: call again for a fresh scan.
    pub fn iter_digests(&self) -> Result<Vec<Digest>, StoreError> {
        let dir = self.layout.objects_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut digests = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(digest) = Digest::parse(name) {
                    digests.push(digest);
                }
            }
        }
        digests.sort();
        Ok(digests)
    }

    /// Resolve a shortened hex prefix to the full digest it abbreviates.
    pub fn resolve_full_digest(&self, partial: &PartialDigest) -> Result<Digest, StoreError> {
        let mut found: Option<Digest> = None;
        for digest in self.iter_digests()? {
            if digest.to_hex().starts_with(partial.as_str()) {
                if found.is_some() {
                    return Err(StoreError::AmbiguousReference(partial.to_string()));
                }
                found = Some(digest);
            }
        }
        found.ok_or_else(|| StoreError::UnknownReference(partial.to_string()))
    }
}
