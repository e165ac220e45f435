//! Deterministic structural snapshots of directory trees.
//!
//! A [`Manifest`] records the full recursive listing of a directory: names,
//! kinds, permission bits, sizes, and content digests. Identical directory
//! contents always produce an identical manifest digest regardless of where
//! the tree lives on disk or the order the filesystem lists it in, which is
//! what makes manifests usable as content-addressed graph nodes.

use crate::encoding;
use crate::{Digest, SchemaError};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

/// Chunk size for streaming file content through the hasher.
const CHUNK_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A nested directory.
    Tree,
    /// A regular file whose content lives in the payload store.
    Blob,
    /// A symbolic link; the digest hashes the link target text.
    Symlink,
    /// An overlay whiteout: this path is deleted relative to lower layers.
    Mask,
}

impl EntryKind {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Tree => 0,
            Self::Blob => 1,
            Self::Symlink => 2,
            Self::Mask => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Result<Self, SchemaError> {
        match value {
            0 => Ok(Self::Tree),
            1 => Ok(Self::Blob),
            2 => Ok(Self::Symlink),
            3 => Ok(Self::Mask),
            other => Err(SchemaError::InvalidEncoding(format!(
                "unknown entry kind: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Tree => "tree",
            Self::Blob => "blob",
            Self::Symlink => "symlink",
            Self::Mask => "mask",
        };
        f.write_str(s)
    }
}

/// One directory-listing record.
///
/// Children are keyed by name in a `BTreeMap`, so iteration order is always
/// name-sorted; that ordering is the determinism invariant for tree digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
    /// Content digest for blobs and symlinks; unused for trees, whose
    /// digest is derived from their children.
    pub object: Digest,
    pub entries: BTreeMap<String, Entry>,
}

impl Entry {
    pub fn tree(mode: u32) -> Self {
        Self {
            kind: EntryKind::Tree,
            mode,
            size: 0,
            object: Digest::empty(),
            entries: BTreeMap::new(),
        }
    }

    pub fn blob(mode: u32, size: u64, object: Digest) -> Self {
        Self {
            kind: EntryKind::Blob,
            mode,
            size,
            object,
            entries: BTreeMap::new(),
        }
    }

    pub fn symlink(mode: u32, target: &str) -> Self {
        Self {
            kind: EntryKind::Symlink,
            mode,
            size: target.len() as u64,
            object: Digest::of_bytes(target.as_bytes()),
            entries: BTreeMap::new(),
        }
    }

    pub fn mask(mode: u32) -> Self {
        Self {
            kind: EntryKind::Mask,
            mode,
            size: 0,
            object: Digest::empty(),
            entries: BTreeMap::new(),
        }
    }

    pub fn is_tree(&self) -> bool {
        self.kind == EntryKind::Tree
    }

    /// The content digest of this entry.
    ///
    /// For trees this hashes the ordered encoding of the child entry
    /// records (child trees contribute their own tree digest), so two trees
    /// with identical contents always share a digest.
    pub fn digest(&self) -> Digest {
        match self.kind {
            EntryKind::Tree => {
                let mut hasher = blake3::Hasher::new();
                for (name, child) in &self.entries {
                    hasher.update(&(name.len() as u64).to_le_bytes());
                    hasher.update(name.as_bytes());
                    hasher.update(&[child.kind.to_u8()]);
                    hasher.update(&child.mode.to_le_bytes());
                    hasher.update(&child.size.to_le_bytes());
                    hasher.update(child.digest().as_bytes());
                }
                hasher.finalize().into()
            }
            _ => self.object,
        }
    }
}

/// Recursive, immutable structural snapshot of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    root: Entry,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// An empty manifest (a directory with no contents).
    pub fn new() -> Self {
        Self {
            root: Entry::tree(0o40755),
        }
    }

    pub fn from_root(root: Entry) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Entry {
        &self.root
    }

    /// Structural identity: equal digests iff structurally equal contents.
    pub fn digest(&self) -> Digest {
        self.root.digest()
    }

    pub fn is_empty(&self) -> bool {
        self.root.entries.is_empty()
    }

    /// Walk all entries depth-first in name-sorted order, yielding
    /// `/`-rooted paths.
    pub fn walk(&self) -> Vec<(String, &Entry)> {
        let mut out = Vec::new();
        walk_tree("", &self.root, &mut out);
        out
    }

    /// Look up an entry by its `/`-separated path.
    pub fn get_path(&self, path: &str) -> Option<&Entry> {
        let mut current = &self.root;
        for step in path.split('/').filter(|s| !s.is_empty()) {
            current = current.entries.get(step)?;
        }
        Some(current)
    }

    /// Digests of the content objects this manifest refers to: file blobs
    /// and symlink targets.
    pub fn child_objects(&self) -> Vec<Digest> {
        self.walk()
            .into_iter()
            .filter(|(_, e)| matches!(e.kind, EntryKind::Blob | EntryKind::Symlink))
            .map(|(_, e)| e.object)
            .collect()
    }

    pub(crate) fn encode(&self, writer: &mut impl Write) -> Result<(), SchemaError> {
        encode_tree(writer, &self.root)
    }

    pub(crate) fn decode(reader: &mut impl Read, mode: u32) -> Result<Self, SchemaError> {
        let mut root = Entry::tree(mode);
        decode_tree(reader, &mut root)?;
        Ok(Self { root })
    }

    pub(crate) fn root_mode(&self) -> u32 {
        self.root.mode
    }
}

fn walk_tree<'a>(prefix: &str, tree: &'a Entry, out: &mut Vec<(String, &'a Entry)>) {
    for (name, entry) in &tree.entries {
        let path = format!("{prefix}/{name}");
        out.push((path.clone(), entry));
        if entry.is_tree() {
            walk_tree(&path, entry, out);
        }
    }
}

fn encode_tree(writer: &mut impl Write, tree: &Entry) -> Result<(), SchemaError> {
    encoding::write_u64(writer, tree.entries.len() as u64)?;
    for (name, entry) in &tree.entries {
        encoding::write_string(writer, name)?;
        encoding::write_u8(writer, entry.kind.to_u8())?;
        encoding::write_u32(writer, entry.mode)?;
        encoding::write_u64(writer, entry.size)?;
        if entry.is_tree() {
            encode_tree(writer, entry)?;
        } else {
            encoding::write_digest(writer, &entry.object)?;
        }
    }
    Ok(())
}

fn decode_tree(reader: &mut impl Read, tree: &mut Entry) -> Result<(), SchemaError> {
    let count = encoding::read_u64(reader)?;
    for _ in 0..count {
        let name = encoding::read_string(reader)?;
        let kind = EntryKind::from_u8(encoding::read_u8(reader)?)?;
        let mode = encoding::read_u32(reader)?;
        let size = encoding::read_u64(reader)?;
        let entry = if kind == EntryKind::Tree {
            let mut child = Entry::tree(mode);
            child.size = size;
            decode_tree(reader, &mut child)?;
            child
        } else {
            Entry {
                kind,
                mode,
                size,
                object: encoding::read_digest(reader)?,
                entries: BTreeMap::new(),
            }
        };
        tree.entries.insert(name, entry);
    }
    Ok(())
}

/// Compute the manifest of a directory tree on disk.
///
/// Listing order never matters: children are keyed by name, so the result
/// is a pure function of directory content. Symlinks hash their target
/// text, regular files stream their bytes in fixed chunks, and overlay
/// whiteout markers (0:0 character devices) become [`EntryKind::Mask`]
/// entries. Any other special file is an error.
pub fn compute_manifest(path: impl AsRef<Path>) -> Result<Manifest, SchemaError> {
    let path = path.as_ref();
    let meta = path.symlink_metadata()?;
    let mut root = Entry::tree(meta.mode());
    build_tree(path, &mut root)?;
    Ok(Manifest { root })
}

fn build_tree(dir: &Path, tree: &mut Entry) -> Result<(), SchemaError> {
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let meta = path.symlink_metadata()?;
        let file_type = meta.file_type();

        let entry = if file_type.is_symlink() {
            let target = fs::read_link(&path)?;
            Entry::symlink(meta.mode(), &target.to_string_lossy())
        } else if file_type.is_dir() {
            let mut child = Entry::tree(meta.mode());
            build_tree(&path, &mut child)?;
            child
        } else if file_type.is_file() {
            Entry::blob(meta.mode(), meta.len(), hash_file(&path)?)
        } else if is_whiteout(&meta) {
            Entry::mask(meta.mode())
        } else {
            return Err(SchemaError::UnsupportedFileType(path));
        };
        tree.entries.insert(name, entry);
    }
    Ok(())
}

fn hash_file(path: &Path) -> Result<Digest, SchemaError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}

/// Overlay filesystems mark a removed path with a character device whose
/// device number is 0:0.
fn is_whiteout(meta: &fs::Metadata) -> bool {
    meta.file_type().is_char_device() && meta.rdev() == 0
}

/// Flatten an ordered stack of manifests into one.
///
/// Later manifests shadow earlier ones; mask entries remove the masked path
/// (and any subtree under it) from the result rather than appearing in it.
pub fn stack_manifests(manifests: &[&Manifest]) -> Manifest {
    let mut result = Manifest::new();
    for manifest in manifests {
        result.root.mode = manifest.root.mode;
        merge_tree(&mut result.root, &manifest.root);
    }
    result
}

fn merge_tree(base: &mut Entry, top: &Entry) {
    for (name, entry) in &top.entries {
        match entry.kind {
            EntryKind::Mask => {
                base.entries.remove(name);
            }
            EntryKind::Tree => {
                let slot = base
                    .entries
                    .entry(name.clone())
                    .or_insert_with(|| Entry::tree(entry.mode));
                if !slot.is_tree() {
                    *slot = Entry::tree(entry.mode);
                }
                slot.mode = entry.mode;
                merge_tree(slot, entry);
            }
            _ => {
                base.entries.insert(name.clone(), entry.clone());
            }
        }
    }
}
