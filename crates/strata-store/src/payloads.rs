use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::{Read, Write};
use strata_schema::Digest;
use tempfile::NamedTempFile;

/// Chunk size for streaming payload content through the hasher.
const CHUNK_SIZE: usize = 4096;

/// Raw byte storage for blob contents, keyed by content digest.
///
/// Data is streamed through the hasher into a temp file and only renamed to
/// its digest name once fully flushed, so a reader can never observe a
/// half-written payload under a published digest.
pub struct PayloadStore {
    layout: StoreLayout,
}

impl PayloadStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Stream content into the store, returning its digest and size.
    /// Idempotent — identical content yields the same digest and the
    /// existing file is kept.
    pub fn write_payload(&self, mut reader: impl Read) -> Result<(Digest, u64), StoreError> {
        let dir = self.layout.payloads_dir();
        let mut tmp = NamedTempFile::new_in(&dir)?;
        let mut hasher = blake3::Hasher::new();
        let mut buf = [0u8; CHUNK_SIZE];
        let mut size: u64 = 0;

        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            tmp.write_all(&buf[..n])?;
            size += n as u64;
        }

        let digest: Digest = hasher.finalize().into();
        let dest = dir.join(digest.to_hex());
        if dest.exists() {
            // Already stored; the temp file is discarded on drop.
            return Ok((digest, size));
        }

        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;

        Ok((digest, size))
    }

    /// Open a payload for reading.
    pub fn open_payload(&self, digest: &Digest) -> Result<fs::File, StoreError> {
        let path = self.layout.payloads_dir().join(digest.to_hex());
        match fs::File::open(&path) {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::UnknownObject(*digest))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Non-throwing existence probe against the store's index.
    pub fn has_payload(&self, digest: &Digest) -> bool {
        self.layout.payloads_dir().join(digest.to_hex()).exists()
    }

    pub fn remove_payload(&self, digest: &Digest) -> Result<(), StoreError> {
        let path = self.layout.payloads_dir().join(digest.to_hex());
        if !path.exists() {
            return Err(StoreError::UnknownObject(*digest));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    /// All stored payload digests, sorted. Restartable.
    pub fn iter_digests(&self) -> Result<Vec<Digest>, StoreError> {
        let dir = self.layout.payloads_dir();
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
}
