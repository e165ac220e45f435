//! Typed nodes of the content-addressed object graph.
//!
//! The kind set is closed: blobs, manifests, layers, and platforms. Every
//! operation over the graph (integrity checking, reachability, sync)
//! matches exhaustively over [`Object`], so adding a kind is a deliberate,
//! compiler-enforced change rather than an open subclassing point.

use crate::encoding;
use crate::manifest::Manifest;
use crate::{Digest, SchemaError};
use std::io::{Read, Write};

/// Header byte identifying each object kind on disk and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Manifest,
    Layer,
    Platform,
}

impl ObjectKind {
    fn to_u8(self) -> u8 {
        match self {
            Self::Blob => 0,
            Self::Manifest => 1,
            Self::Layer => 2,
            Self::Platform => 3,
        }
    }

    fn from_u8(value: u8) -> Result<Self, SchemaError> {
        match value {
            0 => Ok(Self::Blob),
            1 => Ok(Self::Manifest),
            2 => Ok(Self::Layer),
            3 => Ok(Self::Platform),
            other => Err(SchemaError::InvalidEncoding(format!(
                "unknown object kind: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Blob => "blob",
            Self::Manifest => "manifest",
            Self::Layer => "layer",
            Self::Platform => "platform",
        };
        f.write_str(s)
    }
}

/// A graph object referencing raw content in the payload store.
///
/// A blob's identity is its payload digest, so a manifest entry's content
/// digest addresses both the blob object and its payload with one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub payload: Digest,
    pub size: u64,
}

/// Names one manifest as a committable, taggable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub manifest: Digest,
}

/// An ordered composition of layers (or nested platforms).
///
/// Order is significant: later entries shadow earlier ones when the stack
/// is overlaid as a filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub stack: Vec<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Manifest(Manifest),
    Layer(Layer),
    Platform(Platform),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Manifest(_) => ObjectKind::Manifest,
            Self::Layer(_) => ObjectKind::Layer,
            Self::Platform(_) => ObjectKind::Platform,
        }
    }

    /// Content identity of this object.
    ///
    /// Layers and platforms hash their encoded byte form. A manifest's
    /// digest is its root tree digest, so a manifest object and a freshly
    /// computed manifest of the same content always agree; a blob's digest
    /// is its payload digest, so manifest entries address blob objects
    /// directly by content.
    pub fn digest(&self) -> Result<Digest, SchemaError> {
        match self {
            Self::Manifest(m) => Ok(m.digest()),
            Self::Blob(b) => Ok(b.payload),
            _ => {
                let mut buf = Vec::new();
                self.encode(&mut buf)?;
                Ok(Digest::of_bytes(&buf))
            }
        }
    }

    /// Digests of the objects this node refers to, per kind.
    ///
    /// Blobs reference no graph objects (their payload lives in the payload
    /// store, not the graph); manifests reference their blobs; layers their
    /// manifest; platforms every stack member.
    pub fn child_objects(&self) -> Vec<Digest> {
        match self {
            Self::Blob(_) => Vec::new(),
            Self::Manifest(m) => m.child_objects(),
            Self::Layer(l) => vec![l.manifest],
            Self::Platform(p) => p.stack.clone(),
        }
    }

    /// Serialize to the stable binary form: a kind header byte followed by
    /// the kind-specific body. Round-trips byte-for-byte through
    /// [`Object::decode`].
    pub fn encode(&self, writer: &mut impl Write) -> Result<(), SchemaError> {
        encoding::write_u8(writer, self.kind().to_u8())?;
        match self {
            Self::Blob(b) => {
                encoding::write_digest(writer, &b.payload)?;
                encoding::write_u64(writer, b.size)?;
            }
            Self::Manifest(m) => {
                encoding::write_u32(writer, m.root_mode())?;
                m.encode(writer)?;
            }
            Self::Layer(l) => {
                encoding::write_digest(writer, &l.manifest)?;
            }
            Self::Platform(p) => {
                encoding::write_u64(writer, p.stack.len() as u64)?;
                for digest in &p.stack {
                    encoding::write_digest(writer, digest)?;
                }
            }
        }
        Ok(())
    }

    pub fn decode(reader: &mut impl Read) -> Result<Self, SchemaError> {
        let kind = ObjectKind::from_u8(encoding::read_u8(reader)?)?;
        match kind {
            ObjectKind::Blob => {
                let payload = encoding::read_digest(reader)?;
                let size = encoding::read_u64(reader)?;
                Ok(Self::Blob(Blob { payload, size }))
            }
            ObjectKind::Manifest => {
                let mode = encoding::read_u32(reader)?;
                Ok(Self::Manifest(Manifest::decode(reader, mode)?))
            }
            ObjectKind::Layer => {
                let manifest = encoding::read_digest(reader)?;
                Ok(Self::Layer(Layer { manifest }))
            }
            ObjectKind::Platform => {
                let count = encoding::read_u64(reader)?;
                let mut stack = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    stack.push(encoding::read_digest(reader)?);
                }
                Ok(Self::Platform(Platform { stack }))
            }
        }
    }
}

impl From<Blob> for Object {
    fn from(b: Blob) -> Self {
        Self::Blob(b)
    }
}

impl From<Manifest> for Object {
    fn from(m: Manifest) -> Self {
        Self::Manifest(m)
    }
}

impl From<Layer> for Object {
    fn from(l: Layer) -> Self {
        Self::Layer(l)
    }
}

impl From<Platform> for Object {
    fn from(p: Platform) -> Self {
        Self::Platform(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(obj: &Object) -> Object {
        let mut buf = Vec::new();
        obj.encode(&mut buf).unwrap();
        let decoded = Object::decode(&mut buf.as_slice()).unwrap();
        let mut buf2 = Vec::new();
        decoded.encode(&mut buf2).unwrap();
        assert_eq!(buf, buf2, "re-encode must be byte-identical");
        decoded
    }

    #[test]
    fn blob_roundtrip() {
        let obj = Object::Blob(Blob {
            payload: Digest::of_bytes(b"content"),
            size: 7,
        });
        assert_eq!(roundtrip(&obj), obj);
    }

    #[test]
    fn layer_roundtrip() {
        let obj = Object::Layer(Layer {
            manifest: Digest::of_bytes(b"m"),
        });
        assert_eq!(roundtrip(&obj), obj);
    }

    #[test]
    fn platform_roundtrip_preserves_order() {
        let obj = Object::Platform(Platform {
            stack: vec![Digest::of_bytes(b"a"), Digest::of_bytes(b"b")],
        });
        let decoded = roundtrip(&obj);
        match decoded {
            Object::Platform(p) => {
                assert_eq!(p.stack, vec![Digest::of_bytes(b"a"), Digest::of_bytes(b"b")]);
            }
            other => panic!("expected platform, got {other:?}"),
        }
    }

    #[test]
    fn blob_identity_is_its_payload_identity() {
        let payload = Digest::of_bytes(b"content");
        let obj = Object::Blob(Blob { payload, size: 7 });
        assert_eq!(obj.digest().unwrap(), payload);
    }

    #[test]
    fn digest_is_stable_across_encodes() {
        let obj = Object::Platform(Platform {
            stack: vec![Digest::of_bytes(b"x")],
        });
        assert_eq!(obj.digest().unwrap(), obj.digest().unwrap());
    }

    #[test]
    fn child_objects_per_kind() {
        let blob = Object::Blob(Blob {
            payload: Digest::of_bytes(b"p"),
            size: 1,
        });
        assert!(blob.child_objects().is_empty());

        let layer = Object::Layer(Layer {
            manifest: Digest::of_bytes(b"m"),
        });
        assert_eq!(layer.child_objects(), vec![Digest::of_bytes(b"m")]);

        let platform = Object::Platform(Platform {
            stack: vec![Digest::of_bytes(b"a"), Digest::of_bytes(b"b")],
        });
        assert_eq!(platform.child_objects().len(), 2);
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let buf = [9u8, 0, 0];
        assert!(Object::decode(&mut buf.as_ref()).is_err());
    }
}
