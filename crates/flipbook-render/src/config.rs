//! Render cache configuration.

use flipbook_core::{limits, FlipbookError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Memory and eviction policy of a [`RenderCache`](crate::RenderCache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCacheConfig {
    /// Hard ceiling on snapshot memory.
    pub max_graphics_memory: u64,
    /// Soft threshold above which unused snapshots are purged right away.
    pub purgeable_graphics_memory: u64,
    /// Unused snapshots are purged after this many frames.
    pub expired_frames: u32,
    /// Consecutive frames above the soft threshold before it is enforced
    /// on every snapshot.
    pub over_budget_frames: u32,
    /// Mipmaps are generated when min scale / scale is below this.
    pub mipmap_threshold: f32,
}

impl Default for RenderCacheConfig {
    fn default() -> Self {
        Self {
            max_graphics_memory: limits::MAX_GRAPHICS_MEMORY,
            purgeable_graphics_memory: limits::PURGEABLE_GRAPHICS_MEMORY,
            expired_frames: limits::PURGEABLE_EXPIRED_FRAME,
            over_budget_frames: limits::OVER_BUDGET_FRAMES,
            mipmap_threshold: limits::MIPMAP_ENABLED_THRESHOLD,
        }
    }
}

impl RenderCacheConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            FlipbookError::InvalidParameter(format!("config {}: {e}", path.display()))
        })
    }
}
