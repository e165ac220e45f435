//! Repository-local configuration.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Named remote repositories, stored as JSON at the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotesConfig {
    #[serde(default)]
    remotes: BTreeMap<String, PathBuf>,
}

impl RemotesConfig {
    /// Load from disk; a missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        match fs::read_to_string(path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_remote(name: &str, path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.set_remote(name, path);
        config
    }

    pub fn set_remote(&mut self, name: &str, path: impl Into<PathBuf>) {
        self.remotes.insert(name.to_owned(), path.into());
    }

    pub fn remove_remote(&mut self, name: &str) -> bool {
        self.remotes.remove(name).is_some()
    }

    pub fn remote(&self, name: &str) -> Option<&Path> {
        self.remotes.get(name).map(PathBuf::as_path)
    }

    pub fn remotes(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.remotes
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }
}
