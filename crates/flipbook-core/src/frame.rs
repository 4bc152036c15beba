//! Pixel descriptors and CPU-side frame buffers.
//!
//! `ImageInfo` is the fixed pixel descriptor shared by the disk cache and the
//! render cache; `PixelBuffer` is the decoded-pixel sink every reader writes
//! into.

use crate::error::{FlipbookError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel color type. The discriminant is the on-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ColorType {
    #[default]
    Unknown = 0,
    /// 8-bit alpha only
    Alpha8 = 1,
    /// 8-bit grayscale
    Gray8 = 2,
    /// 16-bit packed RGB
    Rgb565 = 3,
    /// 8-bit RGBA (32 bits per pixel)
    Rgba8888 = 4,
    /// 8-bit BGRA (32 bits per pixel)
    Bgra8888 = 5,
    /// 16-bit RGBA half-float (64 bits per pixel)
    RgbaF16 = 6,
    /// 10-bit RGB with 2-bit alpha
    Rgba1010102 = 7,
}

impl ColorType {
    /// Bytes per pixel, or 0 for `Unknown`.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Unknown => 0,
            Self::Alpha8 | Self::Gray8 => 1,
            Self::Rgb565 => 2,
            Self::Rgba8888 | Self::Bgra8888 | Self::Rgba1010102 => 4,
            Self::RgbaF16 => 8,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Unknown,
            1 => Self::Alpha8,
            2 => Self::Gray8,
            3 => Self::Rgb565,
            4 => Self::Rgba8888,
            5 => Self::Bgra8888,
            6 => Self::RgbaF16,
            7 => Self::Rgba1010102,
            _ => return None,
        })
    }
}

/// How the alpha channel of a pixel is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AlphaType {
    #[default]
    Unknown = 0,
    Opaque = 1,
    Premultiplied = 2,
    Unpremultiplied = 3,
}

impl AlphaType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Unknown,
            1 => Self::Opaque,
            2 => Self::Premultiplied,
            3 => Self::Unpremultiplied,
            _ => return None,
        })
    }
}

/// Describes the memory layout of a block of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub color_type: ColorType,
    pub alpha_type: AlphaType,
    /// Bytes per row (may include padding)
    pub row_bytes: u32,
}

impl ImageInfo {
    /// Create a descriptor with tightly packed rows.
    pub fn new(width: u32, height: u32, color_type: ColorType, alpha_type: AlphaType) -> Self {
        let row_bytes = width as usize * color_type.bytes_per_pixel();
        Self {
            width,
            height,
            color_type,
            alpha_type,
            row_bytes: row_bytes as u32,
        }
    }

    /// Premultiplied RGBA8888, the format most frames are cached in.
    pub fn rgba(width: u32, height: u32) -> Self {
        Self::new(width, height, ColorType::Rgba8888, AlphaType::Premultiplied)
    }

    /// Create a descriptor with an explicit row stride.
    pub fn with_row_bytes(
        width: u32,
        height: u32,
        color_type: ColorType,
        alpha_type: AlphaType,
        row_bytes: u32,
    ) -> Result<Self> {
        let info = Self {
            width,
            height,
            color_type,
            alpha_type,
            row_bytes,
        };
        if (row_bytes as usize) < info.min_row_bytes() {
            return Err(FlipbookError::InvalidParameter(format!(
                "row bytes {} smaller than {} for width {}",
                row_bytes,
                info.min_row_bytes(),
                width
            )));
        }
        Ok(info)
    }

    /// True if the descriptor cannot hold any pixel.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.color_type == ColorType::Unknown
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.color_type.bytes_per_pixel()
    }

    pub fn min_row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Total bytes needed to hold the pixels, including row padding.
    pub fn byte_size(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.row_bytes as usize * self.height as usize
    }

    /// Number of pixels covered by this descriptor.
    pub fn pixel_area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A decoded frame in CPU memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    info: ImageInfo,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer for the given descriptor.
    pub fn new(info: ImageInfo) -> Self {
        Self {
            info,
            data: vec![0u8; info.byte_size()],
        }
    }

    /// Wrap existing pixel bytes. Fails if the length doesn't match the descriptor.
    pub fn from_vec(info: ImageInfo, data: Vec<u8>) -> Result<Self> {
        if info.is_empty() || data.len() != info.byte_size() {
            return Err(FlipbookError::ShapeMismatch(format!(
                "{} bytes for a {}x{} {:?} buffer of {} bytes",
                data.len(),
                info.width,
                info.height,
                info.color_type,
                info.byte_size()
            )));
        }
        Ok(Self { info, data })
    }

    #[inline]
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.info.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.info.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Get a row of pixel data, without the stride padding.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.info.row_bytes as usize;
        &self.data[start..start + self.info.min_row_bytes()]
    }

    /// Get a mutable row of pixel data, without the stride padding.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.info.row_bytes as usize;
        let len = self.info.min_row_bytes();
        &mut self.data[start..start + len]
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Create an RGBA test pattern (color bars shifted by `seed`).
    pub fn test_pattern(width: u32, height: u32, seed: u32) -> Self {
        let mut frame = Self::new(ImageInfo::rgba(width, height));
        let colors: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = ((x * 8 / width.max(1)) + seed) % 8;
                row[i..i + 4].copy_from_slice(&colors[bar as usize]);
            }
        }
        frame
    }
}

/// Arc-wrapped pixel buffer for shared ownership.
pub type SharedPixels = Arc<PixelBuffer>;
