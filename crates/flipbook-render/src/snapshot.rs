//! Rasterized snapshots of asset content.

use crate::texture::Image;
use flipbook_core::AssetId;
use glam::Affine2;

/// A cached rasterization of one asset at one scale factor.
#[derive(Clone)]
pub struct Snapshot {
    pub image: Image,
    /// Maps snapshot pixels back into asset space.
    pub transform: Affine2,
    pub asset_id: AssetId,
    /// Content version the snapshot was rendered from.
    pub content_key: u64,
    pub scale_factor: f32,
    /// Consecutive frames the snapshot has gone unused.
    pub idle_frames: u32,
}

impl Snapshot {
    pub fn new(image: Image, asset_id: AssetId, content_key: u64, scale_factor: f32) -> Self {
        let inverse = if scale_factor > 0.0 { 1.0 / scale_factor } else { 1.0 };
        Self {
            image,
            transform: Affine2::from_scale(glam::Vec2::splat(inverse)),
            asset_id,
            content_key,
            scale_factor,
            idle_frames: 0,
        }
    }

    pub fn memory_usage(&self) -> u64 {
        self.image.memory_usage() as u64
    }

    /// True if this snapshot still represents `content_key` at `scale_factor`.
    pub fn matches(&self, content_key: u64, scale_factor: f32, precision: f32) -> bool {
        self.content_key == content_key && (self.scale_factor - scale_factor).abs() <= precision
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("asset_id", &self.asset_id)
            .field("content_key", &self.content_key)
            .field("scale_factor", &self.scale_factor)
            .field("size", &(self.image.width(), self.image.height()))
            .field("idle_frames", &self.idle_frames)
            .finish()
    }
}

/// Content that can be rasterized into a [`Snapshot`].
pub trait SnapshotSource {
    fn asset_id(&self) -> AssetId;

    /// Changes whenever the content would rasterize differently.
    fn content_key(&self) -> u64;

    /// Scale the content is drawn at this frame. Zero means invisible.
    fn scale_factor(&self) -> f32;

    /// Smallest scale the content has been drawn at.
    fn min_scale_factor(&self) -> f32 {
        self.scale_factor()
    }

    fn make_snapshot(&self, scale_factor: f32, mipmapped: bool) -> Option<Snapshot>;
}
