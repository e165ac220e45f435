//! Named, versioned pointers into the object graph.

use crate::encoding;
use crate::{Digest, SchemaError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The character separating a tag name from a version offset.
const VERSION_SEPARATOR: char = '~';

/// One version in a tag stream: a human name bound to a storage object at a
/// point in time.
///
/// Much like a commit, each tag records the digest of its predecessor so a
/// stream forms an append-only chain of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Hierarchical `/`-separated stream name.
    pub name: String,
    /// Position in the stream; strictly increasing, newest is highest.
    pub version: u64,
    pub target: Digest,
    /// Digest of the previous version's tag, or the empty digest for the
    /// first version.
    pub parent: Digest,
    pub user: String,
    pub time: DateTime<Utc>,
}

impl Tag {
    pub fn new(name: &str, target: Digest) -> Result<Self, SchemaError> {
        let spec = TagSpec::parse(name)?;
        Ok(Self {
            name: spec.path().to_owned(),
            version: 0,
            target,
            parent: Digest::empty(),
            user: default_user(),
            time: now_to_the_second(),
        })
    }

    /// Content identity of this tag entry, used for parent chaining.
    pub fn digest(&self) -> Result<Digest, SchemaError> {
        let mut buf = Vec::new();
        encoding::write_string(&mut buf, &self.name)?;
        encoding::write_u64(&mut buf, self.version)?;
        encoding::write_digest(&mut buf, &self.target)?;
        encoding::write_digest(&mut buf, &self.parent)?;
        encoding::write_string(&mut buf, &self.user)?;
        encoding::write_string(&mut buf, &self.time.to_rfc3339())?;
        Ok(Digest::of_bytes(&buf))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{} -> {}", self.name, self.version, self.target)
    }
}

/// Tag times round-trip through RFC 3339 text; drop sub-second noise so a
/// written-then-read tag compares equal.
fn now_to_the_second() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now)
}

fn default_user() -> String {
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_owned());
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_owned());
    format!("{user}@{host}")
}

/// A parsed reference to a position in a tag stream: `name[~N]`.
///
/// `name` is a hierarchical `/`-separated path; `~N` asks for the version N
/// steps behind the latest, with `~0` (or no suffix) meaning the latest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    path: String,
    version: u64,
}

impl TagSpec {
    pub fn parse(spec: &str) -> Result<Self, SchemaError> {
        let (path, version) = match spec.split_once(VERSION_SEPARATOR) {
            Some((path, version_str)) => {
                let version = version_str.parse::<u64>().map_err(|_| SchemaError::InvalidTag {
                    spec: spec.to_owned(),
                    reason: format!("version must be a non-negative integer, got '{version_str}'"),
                })?;
                (path, version)
            }
            None => (spec, 0),
        };

        if path.is_empty() {
            return Err(SchemaError::InvalidTag {
                spec: spec.to_owned(),
                reason: "tag name cannot be empty".to_owned(),
            });
        }
        for component in path.split('/') {
            if component.is_empty() {
                return Err(SchemaError::InvalidTag {
                    spec: spec.to_owned(),
                    reason: "empty path component".to_owned(),
                });
            }
            if let Some(bad) = component
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
            {
                return Err(SchemaError::InvalidTag {
                    spec: spec.to_owned(),
                    reason: format!("invalid character '{bad}' in tag name"),
                });
            }
        }

        Ok(Self {
            path: path.to_owned(),
            version,
        })
    }

    /// The stream name, with no version suffix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Steps back from the latest version (0 = latest).
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl fmt::Display for TagSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version == 0 {
            f.write_str(&self.path)
        } else {
            write!(f, "{}{VERSION_SEPARATOR}{}", self.path, self.version)
        }
    }
}

impl FromStr for TagSpec {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
