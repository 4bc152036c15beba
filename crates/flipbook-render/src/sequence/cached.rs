use super::{check_frame, SequenceReader};
use flipbook_core::{FlipbookError, Frame, ImageInfo, PixelBuffer, Result, SharedPixels, TimeRange};
use flipbook_disk::{DiskCache, SequenceFile};
use std::sync::Arc;
use tracing::{debug, warn};

/// Serves frames from a disk-cached [`SequenceFile`], decoding misses with
/// an inner reader and storing the result.
pub struct CachedSequenceReader {
    file: Arc<SequenceFile>,
    inner: Arc<dyn SequenceReader>,
}

impl CachedSequenceReader {
    /// Open the cache file for `key` with the shape of `inner`.
    pub fn open(cache: &DiskCache, key: &str, inner: Arc<dyn SequenceReader>) -> Result<Self> {
        let file = cache.open_sequence(
            key,
            inner.info(),
            inner.frame_count(),
            inner.frame_rate(),
            inner.static_time_ranges(),
        )?;
        debug!(key, cached = file.cached_frame_count(), "Opened cached sequence");
        Ok(Self { file, inner })
    }

    pub fn file(&self) -> &Arc<SequenceFile> {
        &self.file
    }

    fn read_cached(&self, index: u32) -> Option<SharedPixels> {
        if !self.file.is_frame_cached(index) {
            return None;
        }
        let mut pixels = PixelBuffer::new(*self.file.info());
        match self.file.read_frame(index, &mut pixels) {
            Ok(()) => Some(Arc::new(pixels)),
            Err(e) => {
                warn!(frame = index, error = %e, "Cached frame unreadable, decoding again");
                None
            }
        }
    }
}

impl SequenceReader for CachedSequenceReader {
    fn info(&self) -> ImageInfo {
        *self.file.info()
    }

    fn frame_count(&self) -> u32 {
        self.file.num_frames()
    }

    fn frame_rate(&self) -> f32 {
        self.file.frame_rate()
    }

    fn static_time_ranges(&self) -> &[TimeRange] {
        self.file.static_time_ranges()
    }

    fn is_video(&self) -> bool {
        self.inner.is_video()
    }

    fn read_frame(&self, frame: Frame) -> Result<SharedPixels> {
        let index = check_frame(frame, self.frame_count())?;
        if let Some(pixels) = self.read_cached(index) {
            return Ok(pixels);
        }
        let pixels = self.inner.read_frame(frame)?;
        match self.file.write_frame(index, &pixels) {
            // Another reader stored it first.
            Ok(()) | Err(FlipbookError::FrameAlreadyWritten(_)) => {}
            Err(e) => warn!(frame, error = %e, "Failed to cache frame"),
        }
        Ok(pixels)
    }
}
