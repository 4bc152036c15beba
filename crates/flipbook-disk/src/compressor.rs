//! Stateless LZ4 block compression for cached frames.
//!
//! Frames are compressed as raw LZ4 blocks without a size prefix; the caller
//! always knows the decompressed size from the pixel descriptor.

use flipbook_core::{FlipbookError, Result};
use serde::{Deserialize, Serialize};

/// Compression scheme identifier, stored in every sequence file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionType {
    #[default]
    Lz4Block = 1,
}

impl CompressionType {
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Lz4Block),
            _ => None,
        }
    }
}

/// Conservative upper bound of the compressed size, for scratch buffer sizing.
#[inline]
pub fn max_compressed_size(input_size: usize) -> usize {
    lz4_flex::block::get_maximum_output_size(input_size)
}

/// Compress `src` into a new buffer.
pub fn compress(src: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress(src)
}

/// Compress `src` into `dst`, returning the compressed length.
///
/// `dst` must hold at least [`max_compressed_size`] bytes.
pub fn compress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    if dst.len() < max_compressed_size(src.len()) {
        return Err(FlipbookError::Codec(format!(
            "scratch buffer of {} bytes is too small for {} input bytes",
            dst.len(),
            src.len()
        )));
    }
    lz4_flex::block::compress_into(src, dst).map_err(|e| FlipbookError::Codec(e.to_string()))
}

/// Decompress `src`, which must expand to exactly `expected_size` bytes.
pub fn decompress(src: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = vec![0u8; expected_size];
    decompress_into(src, &mut output)?;
    Ok(output)
}

/// Decompress `src` into `dst`; succeeds only if it fills `dst` exactly.
///
/// On failure the contents of `dst` are unspecified.
pub fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<()> {
    let written = lz4_flex::block::decompress_into(src, dst)
        .map_err(|e| FlipbookError::Codec(e.to_string()))?;
    if written != dst.len() {
        return Err(FlipbookError::Codec(format!(
            "decoded {} bytes, expected {}",
            written,
            dst.len()
        )));
    }
    Ok(())
}
