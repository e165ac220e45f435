use crate::SchemaError;
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Size in bytes of every digest in the system.
pub const DIGEST_SIZE: usize = 32;

/// Content fingerprint identifying stored data by its bytes.
///
/// A digest is a 32-byte blake3 hash with a canonical lowercase-hex text
/// form. Two digests are equal iff their binary content is bit-identical;
/// everything in the object graph hangs off this identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    pub const fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// The digest of zero bytes of content.
    pub fn empty() -> Self {
        Self::of_bytes(b"")
    }

    /// Hash a byte slice in one shot.
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        let mut s = String::with_capacity(DIGEST_SIZE * 2);
        for b in self.0 {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }

    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        if s.len() != DIGEST_SIZE * 2 {
            return Err(SchemaError::InvalidDigest(format!(
                "expected {} hex characters, got {}",
                DIGEST_SIZE * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; DIGEST_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &s[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16)
                .map_err(|_| SchemaError::InvalidDigest(format!("non-hex character in '{s}'")))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

struct DigestVisitor;

impl Visitor<'_> for DigestVisitor {
    type Value = Digest;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a 64-character hex digest string")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Digest, E> {
        Digest::parse(v).map_err(|e| E::custom(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(DigestVisitor)
    }
}

/// A shortened hex prefix of a full digest, as typed by users.
///
/// Carries no identity of its own; it must be resolved against a store to
/// recover the full digest it abbreviates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDigest(String);

impl PartialDigest {
    /// Parse a hex prefix. At least two characters are required so that a
    /// bare file separator or single letter never matches half a store.
    pub fn parse(s: &str) -> Result<Self, SchemaError> {
        if s.len() < 2 || s.len() > DIGEST_SIZE * 2 {
            return Err(SchemaError::InvalidDigest(format!(
                "partial digest must be 2..={} characters: '{s}'",
                DIGEST_SIZE * 2
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SchemaError::InvalidDigest(format!(
                "non-hex character in partial digest '{s}'"
            )));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartialDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
