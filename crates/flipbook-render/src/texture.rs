//! GPU image handles.

use flipbook_core::{ImageInfo, SharedPixels};
use std::sync::Arc;

/// A GPU-resident image. The cache only needs to know how much memory it holds.
pub trait GpuImage: Send + Sync {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Memory held by the image in bytes, including mip levels.
    fn memory_usage(&self) -> usize;

    fn is_mipmapped(&self) -> bool {
        false
    }
}

/// Shared handle to a GPU image.
pub type Image = Arc<dyn GpuImage>;

/// An image uploaded from decoded pixels.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pixels: SharedPixels,
    mipmapped: bool,
}

impl TextureImage {
    /// Upload `pixels`, optionally with a full mip chain.
    pub fn upload(pixels: SharedPixels, mipmapped: bool) -> Arc<Self> {
        Arc::new(Self { pixels, mipmapped })
    }

    pub fn info(&self) -> &ImageInfo {
        self.pixels.info()
    }

    /// The pixels backing the base level.
    pub fn pixels(&self) -> &SharedPixels {
        &self.pixels
    }
}

impl GpuImage for TextureImage {
    fn width(&self) -> u32 {
        self.pixels.width()
    }

    fn height(&self) -> u32 {
        self.pixels.height()
    }

    fn memory_usage(&self) -> usize {
        let base = self.pixels.memory_size();
        // A full mip chain adds about a third.
        if self.mipmapped {
            base + base / 3
        } else {
            base
        }
    }

    fn is_mipmapped(&self) -> bool {
        self.mipmapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipbook_core::PixelBuffer;

    #[test]
    fn test_memory_usage() {
        let pixels = Arc::new(PixelBuffer::test_pattern(64, 32, 0));
        let plain = TextureImage::upload(pixels.clone(), false);
        assert_eq!(plain.memory_usage(), 64 * 32 * 4);
        let mipmapped = TextureImage::upload(pixels, true);
        assert_eq!(mipmapped.memory_usage(), 64 * 32 * 4 + 64 * 32 * 4 / 3);
        assert!(mipmapped.is_mipmapped());
        assert_eq!((plain.width(), plain.height()), (64, 32));
    }
}
