use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use fs2::FileExt;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::debug;

use strata_schema::{Digest, Tag, TagSpec};

/// File extension for tag stream files under the tags directory.
const TAG_EXT: &str = "tag";

/// Append-only streams of [`Tag`] versions, one JSON-lines file per stream.
///
/// Stream files hold entries oldest-first; all read APIs present them
/// newest-first, matching the `~N` offset notation where `~0` is the latest.
pub struct TagStore {
    layout: StoreLayout,
}

impl TagStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    fn stream_path(&self, name: &str) -> PathBuf {
        self.layout.tags_dir().join(format!("{name}.{TAG_EXT}"))
    }

    /// Take the store-wide tag lock for the duration of a mutation.
    /// Released when the returned file handle drops.
    pub(crate) fn lock(&self) -> Result<fs::File, StoreError> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.layout.lock_file())?;
        file.lock_exclusive()
            .map_err(|e| StoreError::LockFailed(e.to_string()))?;
        Ok(file)
    }

    /// Append a new version to the named stream, returning the written tag.
    ///
    /// The version number and parent digest are assigned here, under the
    /// store lock, so two concurrent pushes cannot mint the same version.
    pub fn push_tag(&self, name: &str, target: &Digest) -> Result<Tag, StoreError> {
        let _lock = self.lock()?;

        let spec = TagSpec::parse(name)?;
        let mut stream = self.read_stream_oldest_first(spec.path())?;
        let mut tag = Tag::new(spec.path(), *target)?;
        if let Some(head) = stream.last() {
            tag.version = head.version + 1;
            tag.parent = head.digest()?;
        }
        stream.push(tag.clone());
        self.write_stream(spec.path(), &stream)?;

        debug!(tag = %tag, "pushed tag");
        Ok(tag)
    }

    /// Insert a fully-formed tag at its stated version, preserving its user,
    /// time and parent. Used when syncing tags between repositories.
    pub fn push_raw_tag(&self, tag: &Tag) -> Result<(), StoreError> {
        let _lock = self.lock()?;

        let spec = TagSpec::parse(&tag.name)?;
        let mut stream = self.read_stream_oldest_first(spec.path())?;
        if stream.iter().any(|t| t.version == tag.version) {
            return Err(StoreError::TagVersionExists {
                name: tag.name.clone(),
                version: tag.version,
            });
        }
        stream.push(tag.clone());
        stream.sort_by_key(|t| t.version);
        self.write_stream(spec.path(), &stream)?;
        Ok(())
    }

    /// Resolve a spec like `env/prod~2` to the concrete tag two versions
    /// behind the latest.
    pub fn resolve_tag(&self, spec: &TagSpec) -> Result<Tag, StoreError> {
        let stream = self.read_tag_stream(spec.path())?;
        stream
            .into_iter()
            .nth(spec.version() as usize)
            .ok_or_else(|| StoreError::UnknownReference(spec.to_string()))
    }

    /// All versions of the named stream, newest first.
    pub fn read_tag_stream(&self, name: &str) -> Result<Vec<Tag>, StoreError> {
        let mut stream = self.read_stream_oldest_first(name)?;
        if stream.is_empty() {
            return Err(StoreError::UnknownReference(name.to_owned()));
        }
        stream.reverse();
        Ok(stream)
    }

    /// Stream names whose latest version points at the given digest.
    pub fn find_tags(&self, digest: &Digest) -> Result<Vec<TagSpec>, StoreError> {
        let mut found = Vec::new();
        for name in self.stream_names()? {
            let stream = self.read_tag_stream(&name)?;
            if let Some(latest) = stream.first() {
                if latest.target == *digest {
                    found.push(TagSpec::parse(&name)?);
                }
            }
        }
        Ok(found)
    }

    /// Every tag of every stream. Within a stream, newest first.
    pub fn iter_tags(&self) -> Result<Vec<(TagSpec, Tag)>, StoreError> {
        let mut all = Vec::new();
        for name in self.stream_names()? {
            for (offset, tag) in self.read_tag_stream(&name)?.into_iter().enumerate() {
                let spec = if offset == 0 {
                    TagSpec::parse(&name)?
                } else {
                    TagSpec::parse(&format!("{name}~{offset}"))?
                };
                all.push((spec, tag));
            }
        }
        Ok(all)
    }

    /// All stream names present in the store, sorted.
    pub fn stream_names(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let root = self.layout.tags_dir();
        if root.exists() {
            self.collect_names(&root, "", &mut names)?;
        }
        names.sort();
        Ok(names)
    }

    fn collect_names(
        &self,
        dir: &std::path::Path,
        prefix: &str,
        out: &mut Vec<String>,
    ) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let path = entry.path();
            if path.is_dir() {
                let nested = if prefix.is_empty() {
                    name.to_owned()
                } else {
                    format!("{prefix}/{name}")
                };
                self.collect_names(&path, &nested, out)?;
            } else if let Some(stem) = name.strip_suffix(&format!(".{TAG_EXT}")) {
                out.push(if prefix.is_empty() {
                    stem.to_owned()
                } else {
                    format!("{prefix}/{stem}")
                });
            }
        }
        Ok(())
    }

    /// Delete an entire tag stream and all its versions.
    pub fn remove_tag_stream(&self, name: &str) -> Result<(), StoreError> {
        let _lock = self.lock()?;

        let spec = TagSpec::parse(name)?;
        let path = self.stream_path(spec.path());
        if !path.exists() {
            return Err(StoreError::UnknownReference(name.to_owned()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn read_stream_oldest_first(&self, name: &str) -> Result<Vec<Tag>, StoreError> {
        let path = self.stream_path(name);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let mut tags = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            tags.push(serde_json::from_str(&line)?);
        }
        Ok(tags)
    }

    /// Atomically replace a stream file with the given entries, oldest first.
    /// An empty slice removes the file entirely.
    pub(crate) fn write_stream(&self, name: &str, tags: &[Tag]) -> Result<(), StoreError> {
        let path = self.stream_path(name);
        if tags.is_empty() {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            return Ok(());
        }

        let dir = path
            .parent()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| self.layout.tags_dir());
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        for tag in tags {
            serde_json::to_writer(&mut tmp, tag)?;
            tmp.write_all(b"\n")?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;
        Ok(())
    }
}
