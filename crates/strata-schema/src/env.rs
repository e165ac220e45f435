//! The environment reference grammar: `ref1+ref2+...`.

use crate::digest::PartialDigest;
use crate::tag::TagSpec;
use crate::{Digest, SchemaError, DIGEST_SIZE};
use std::fmt;
use std::str::FromStr;

/// The pattern used to split components of an env spec string.
pub const ENV_SPEC_SEPARATOR: char = '+';

/// One component of an environment spec: a tag reference, a full digest, or
/// a digest prefix still needing resolution against a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSpecItem {
    TagSpec(TagSpec),
    Digest(Digest),
    PartialDigest(PartialDigest),
}

impl fmt::Display for EnvSpecItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TagSpec(s) => s.fmt(f),
            Self::Digest(d) => d.fmt(f),
            Self::PartialDigest(p) => p.fmt(f),
        }
    }
}

impl FromStr for EnvSpecItem {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_item(s)
    }
}

fn parse_item(s: &str) -> Result<EnvSpecItem, SchemaError> {
    if s.len() == DIGEST_SIZE * 2 {
        if let Ok(digest) = Digest::parse(s) {
            return Ok(EnvSpecItem::Digest(digest));
        }
    }
    // A short all-hex string is ambiguous between a tag name and a digest
    // prefix; treat it as a prefix, matching how users abbreviate digests.
    if s.len() >= 6 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(EnvSpecItem::PartialDigest(PartialDigest::parse(s)?));
    }
    Ok(EnvSpecItem::TagSpec(TagSpec::parse(s)?))
}

/// A requested ordered stack of references making up an environment.
///
/// Parsed from strings like `base+gcc/9.3+my-edits~1`. Always contains at
/// least one item; the empty string does not parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSpec {
    items: Vec<EnvSpecItem>,
}

impl EnvSpec {
    pub fn parse(spec: &str) -> Result<Self, SchemaError> {
        if spec.is_empty() {
            return Err(SchemaError::InvalidEnvSpec {
                spec: spec.to_owned(),
                reason: "env spec cannot be empty".to_owned(),
            });
        }
        let items = spec
            .split(ENV_SPEC_SEPARATOR)
            .map(parse_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    pub fn items(&self) -> &[EnvSpecItem] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EnvSpecItem> {
        self.items.iter()
    }
}

impl fmt::Display for EnvSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&ENV_SPEC_SEPARATOR.to_string());
        f.write_str(&joined)
    }
}

impl FromStr for EnvSpec {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'a> IntoIterator for &'a EnvSpec {
    type Item = &'a EnvSpecItem;
    type IntoIter = std::slice::Iter<'a, EnvSpecItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
