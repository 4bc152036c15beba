//! Disk cache configuration.

use flipbook_core::{limits, FlipbookError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the disk cache lives and how large it may grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskCacheConfig {
    /// Root directory; holds the key index and a `files/` folder.
    pub cache_dir: PathBuf,
    /// Disk budget in bytes.
    pub max_disk_size: u64,
}

impl Default for DiskCacheConfig {
    fn default() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            cache_dir: base.join("flipbook"),
            max_disk_size: limits::DEFAULT_MAX_DISK_SIZE,
        }
    }
}

impl DiskCacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_max_disk_size(mut self, max_disk_size: u64) -> Self {
        self.max_disk_size = max_disk_size;
        self
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            FlipbookError::InvalidParameter(format!("config {}: {e}", path.display()))
        })
    }

    pub(crate) fn index_path(&self) -> PathBuf {
        self.cache_dir.join("cache.cfg")
    }

    pub(crate) fn files_dir(&self) -> PathBuf {
        self.cache_dir.join("files")
    }
}
