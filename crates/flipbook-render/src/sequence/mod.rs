//! Frame sources for sequence content.
//!
//! A [`SequenceReader`] turns a frame index into decoded pixels. Readers are
//! shared with background prefetch jobs, so they synchronize internally.

mod bitmap;
mod cached;
mod video;

pub use bitmap::{BitmapFrame, BitmapPatch, BitmapSequenceReader};
pub use cached::CachedSequenceReader;
pub use video::VideoSequenceReader;

use flipbook_core::{FlipbookError, Frame, ImageInfo, Result, SharedPixels, TimeRange};

/// Decodes the frames of one sequence.
pub trait SequenceReader: Send + Sync {
    fn info(&self) -> ImageInfo;

    fn frame_count(&self) -> u32;

    fn frame_rate(&self) -> f32;

    /// Spans of pixel-identical frames.
    fn static_time_ranges(&self) -> &[TimeRange] {
        &[]
    }

    fn is_video(&self) -> bool {
        false
    }

    fn read_frame(&self, frame: Frame) -> Result<SharedPixels>;
}

pub(crate) fn check_frame(frame: Frame, count: u32) -> Result<u32> {
    if frame < 0 || frame >= count as i64 {
        return Err(FlipbookError::FrameOutOfRange { index: frame, count });
    }
    Ok(frame as u32)
}
