//! The addressable unit composing all stores behind one API.

use crate::CoreError;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use strata_runtime::RuntimeStorage;
use strata_schema::{
    compute_manifest, Blob, Digest, EntryKind, EnvSpecItem, Layer, Manifest, Object, ObjectKind,
    Platform, TagSpec,
};
use strata_store::{ObjectStore, PayloadStore, StoreLayout, TagStore};

/// A single repository: object graph, payloads, tags and runtimes rooted at
/// one directory.
pub struct Repository {
    layout: StoreLayout,
    objects: ObjectStore,
    payloads: PayloadStore,
    tags: TagStore,
    runtimes: RuntimeStorage,
}

impl Repository {
    /// Open an existing repository, verifying its format version.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        let layout = StoreLayout::new(root.as_ref());
        layout.verify_version()?;
        Ok(Self::from_layout(layout))
    }

    /// Initialize a new repository at `root` (idempotent) and open it.
    pub fn create(root: impl AsRef<Path>) -> Result<Self, CoreError> {
        let layout = StoreLayout::new(root.as_ref());
        layout.initialize()?;
        Self::open(root)
    }

    fn from_layout(layout: StoreLayout) -> Self {
        Self {
            objects: ObjectStore::new(layout.clone()),
            payloads: PayloadStore::new(layout.clone()),
            tags: TagStore::new(layout.clone()),
            runtimes: RuntimeStorage::new(layout.clone()),
            layout,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn payloads(&self) -> &PayloadStore {
        &self.payloads
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn runtimes(&self) -> &RuntimeStorage {
        &self.runtimes
    }

    /// Resolve a single reference string (tag spec, digest, or digest
    /// prefix) to a concrete object digest.
    pub fn resolve_ref_to_digest(&self, reference: &str) -> Result<Digest, CoreError> {
        let item: EnvSpecItem = reference.parse()?;
        self.resolve_item_to_digest(&item)
    }

    pub fn resolve_item_to_digest(&self, item: &EnvSpecItem) -> Result<Digest, CoreError> {
        match item {
            EnvSpecItem::Digest(digest) => Ok(*digest),
            EnvSpecItem::PartialDigest(partial) => {
                Ok(self.objects.resolve_full_digest(partial)?)
            }
            EnvSpecItem::TagSpec(spec) => Ok(self.tags.resolve_tag(spec)?.target),
        }
    }

    /// Resolve and load the object a reference points at.
    pub fn read_ref(&self, reference: &str) -> Result<Object, CoreError> {
        let digest = self.resolve_ref_to_digest(reference)?;
        Ok(self.objects.read_object(&digest)?)
    }

    /// Non-throwing probe for whether a reference resolves.
    pub fn has_ref(&self, reference: &str) -> bool {
        self.read_ref(reference).is_ok()
    }

    pub fn read_blob(&self, digest: &Digest) -> Result<Blob, CoreError> {
        match self.objects.read_object(digest)? {
            Object::Blob(blob) => Ok(blob),
            other => Err(wrong_kind(digest, ObjectKind::Blob, &other)),
        }
    }

    pub fn read_manifest(&self, digest: &Digest) -> Result<Manifest, CoreError> {
        match self.objects.read_object(digest)? {
            Object::Manifest(manifest) => Ok(manifest),
            other => Err(wrong_kind(digest, ObjectKind::Manifest, &other)),
        }
    }

    pub fn read_layer(&self, digest: &Digest) -> Result<Layer, CoreError> {
        match self.objects.read_object(digest)? {
            Object::Layer(layer) => Ok(layer),
            other => Err(wrong_kind(digest, ObjectKind::Layer, &other)),
        }
    }

    pub fn read_platform(&self, digest: &Digest) -> Result<Platform, CoreError> {
        match self.objects.read_object(digest)? {
            Object::Platform(platform) => Ok(platform),
            other => Err(wrong_kind(digest, ObjectKind::Platform, &other)),
        }
    }

    /// Store a stream of content as a payload plus its blob object,
    /// returning the blob's digest.
    pub fn commit_blob(&self, reader: impl Read) -> Result<Digest, CoreError> {
        let (payload, size) = self.payloads.write_payload(reader)?;
        Ok(self.objects.write_object(&Blob { payload, size }.into())?)
    }

    /// Walk a directory into a manifest, storing every file's payload and
    /// blob object along the way, then the manifest object itself.
    ///
    /// Payloads land before the manifest is published, so a manifest in the
    /// store never refers to content the store does not hold.
    pub fn commit_dir(&self, path: impl AsRef<Path>) -> Result<Manifest, CoreError> {
        let path = path.as_ref();
        let manifest = compute_manifest(path)?;

        for (entry_path, entry) in manifest.walk() {
            let file_path = path.join(entry_path.trim_start_matches('/'));
            match entry.kind {
                EntryKind::Blob => {
                    let file = fs::File::open(file_path)?;
                    let (payload, size) = self.payloads.write_payload(file)?;
                    self.objects.write_object(&Blob { payload, size }.into())?;
                }
                // Symlink targets are stored as payloads too, so manifests
                // can be rendered and synced without the source tree.
                EntryKind::Symlink => {
                    let target = fs::read_link(file_path)?;
                    let text = target.to_string_lossy().into_owned();
                    let (payload, size) = self.payloads.write_payload(text.as_bytes())?;
                    self.objects.write_object(&Blob { payload, size }.into())?;
                }
                EntryKind::Tree | EntryKind::Mask => {}
            }
        }
        self.objects.write_object(&manifest.clone().into())?;

        debug!(digest = %manifest.digest(), "committed directory");
        Ok(manifest)
    }

    /// Record a layer pointing at an already-stored manifest.
    pub fn create_layer(&self, manifest: Digest) -> Result<Layer, CoreError> {
        let layer = Layer { manifest };
        self.objects.write_object(&layer.clone().into())?;
        Ok(layer)
    }

    /// Record a platform from an ordered stack of references.
    pub fn create_platform(&self, stack: Vec<Digest>) -> Result<Platform, CoreError> {
        let platform = Platform { stack };
        self.objects.write_object(&platform.clone().into())?;
        Ok(platform)
    }

    pub fn push_tag(&self, name: &str, target: &Digest) -> Result<strata_schema::Tag, CoreError> {
        Ok(self.tags.push_tag(name, target)?)
    }

    /// Every tag name currently pointing at the same object as `reference`,
    /// excluding the reference itself when it names a tag.
    pub fn find_aliases(&self, reference: &str) -> Result<Vec<TagSpec>, CoreError> {
        let digest = self.resolve_ref_to_digest(reference)?;
        let mut aliases = self.tags.find_tags(&digest)?;
        if let Ok(EnvSpecItem::TagSpec(spec)) = reference.parse() {
            aliases.retain(|alias| alias.path() != spec.path());
        }
        Ok(aliases)
    }
}

fn wrong_kind(digest: &Digest, expected: ObjectKind, found: &Object) -> CoreError {
    CoreError::WrongObjectKind {
        digest: *digest,
        expected,
        found: found.kind(),
    }
}
