//! Integration test crate for Flipbook.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every flipbook crate to verify they work together.

use flipbook_core::{ImageInfo, PixelBuffer};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Pixels that LZ4 cannot shrink, so file sizes track frame sizes.
pub fn noise_frame(width: u32, height: u32, seed: u64) -> PixelBuffer {
    let mut frame = PixelBuffer::new(ImageInfo::rgba(width, height));
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    for byte in frame.pixels_mut() {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        *byte = (state >> 24) as u8;
    }
    frame
}

#[cfg(test)]
mod disk;

#[cfg(test)]
mod render;

#[cfg(test)]
mod video;
