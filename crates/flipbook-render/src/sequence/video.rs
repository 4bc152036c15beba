use super::{check_frame, SequenceReader};
use flipbook_core::{FlipbookError, Frame, ImageInfo, Result, SharedPixels, TimeRange, TimeRanges};
use flipbook_video::VideoReader;
use parking_lot::Mutex;

/// Serves sequence frames from a [`VideoReader`].
pub struct VideoSequenceReader {
    reader: VideoReader,
    static_ranges: TimeRanges,
    last: Mutex<Option<SharedPixels>>,
}

impl VideoSequenceReader {
    pub fn new(reader: VideoReader) -> Self {
        Self {
            reader,
            static_ranges: TimeRanges::new(),
            last: Mutex::new(None),
        }
    }

    pub fn with_static_time_ranges(mut self, ranges: &[TimeRange]) -> Self {
        self.static_ranges = ranges.iter().copied().filter(TimeRange::is_valid).collect();
        self
    }

    pub fn reader(&self) -> &VideoReader {
        &self.reader
    }
}

impl SequenceReader for VideoSequenceReader {
    fn info(&self) -> ImageInfo {
        self.reader.format().info
    }

    fn frame_count(&self) -> u32 {
        self.reader.format().frame_count
    }

    fn frame_rate(&self) -> f32 {
        self.reader.format().frame_rate
    }

    fn static_time_ranges(&self) -> &[TimeRange] {
        &self.static_ranges
    }

    fn is_video(&self) -> bool {
        true
    }

    fn read_frame(&self, frame: Frame) -> Result<SharedPixels> {
        let index = check_frame(frame, self.frame_count())?;
        match self.reader.make_buffer(frame)? {
            Some(buffer) => {
                *self.last.lock() = Some(buffer.pixels.clone());
                Ok(buffer.pixels.clone())
            }
            // The stream ended early; keep showing the last frame.
            None => self.last.lock().clone().ok_or(FlipbookError::FrameNotCached(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipbook_core::PixelBuffer;
    use flipbook_video::{encode_frames, DecodingPolicy, DeltaDecoderFactory, VideoDecoderFactory};
    use std::sync::Arc;

    fn reader(frames: &[PixelBuffer]) -> VideoSequenceReader {
        let demuxer = encode_frames(frames, 30.0, 3).unwrap();
        let factories: Vec<Arc<dyn VideoDecoderFactory>> = vec![Arc::new(DeltaDecoderFactory)];
        VideoSequenceReader::new(VideoReader::new(
            Box::new(demuxer),
            &factories,
            DecodingPolicy::Software,
        ))
    }

    #[test]
    fn test_reads_frames_out_of_order() {
        let frames: Vec<_> = (0..6).map(|i| PixelBuffer::test_pattern(16, 8, i)).collect();
        let reader = reader(&frames);
        assert!(reader.is_video());
        assert_eq!(reader.frame_count(), 6);
        for index in [4, 1, 5, 0] {
            assert_eq!(*reader.read_frame(index).unwrap(), frames[index as usize]);
        }
    }

    #[test]
    fn test_out_of_range() {
        let frames: Vec<_> = (0..2).map(|i| PixelBuffer::test_pattern(16, 8, i)).collect();
        let reader = reader(&frames);
        assert!(matches!(
            reader.read_frame(2),
            Err(FlipbookError::FrameOutOfRange { index: 2, count: 2 })
        ));
    }
}
