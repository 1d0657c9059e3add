//! Remotes (connections) the helper knows about, for picking one when a
//! mount is added.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::MainSettings;
use crate::error::Result;
use crate::utils::paths::{default_rclone_config_path, expand_path};

pub trait RemoteCatalog: Send + Sync {
    /// Remote names, in the order the source lists them
    fn remotes(&self) -> Result<Vec<String>>;

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.remotes()?.iter().any(|r| r == name))
    }
}

/// Reads remote names from the section headers of `rclone.conf`
#[derive(Debug, Clone)]
pub struct RcloneConfigCatalog {
    path: PathBuf,
}

impl RcloneConfigCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: expand_path(&path.into()),
        }
    }

    /// `main.rclone_config` if set, else `~/.config/rclone/rclone.conf`
    pub fn from_settings(main: &MainSettings) -> Result<Self> {
        match &main.rclone_config {
            Some(path) => Ok(Self::new(path)),
            None => Ok(Self::new(default_rclone_config_path()?)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RemoteCatalog for RcloneConfigCatalog {
    fn remotes(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            debug!("No rclone config at {}", self.path.display());
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(parse_remote_sections(&content))
    }
}

/// Section names of an INI document, skipping duplicates
pub fn parse_remote_sections(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}
