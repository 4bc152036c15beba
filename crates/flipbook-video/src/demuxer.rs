//! Demuxed sample streams.

use flipbook_core::{frame_to_time, Frame, ImageInfo};
use std::sync::Arc;

/// Stream-level description of an encoded video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFormat {
    pub mime_type: String,
    /// Decoded pixel layout.
    pub info: ImageInfo,
    pub frame_rate: f32,
    pub frame_count: u32,
    /// True if most of the video is still frames; such videos decode fine in software.
    pub static_content: bool,
}

impl VideoFormat {
    /// Duration in microseconds.
    pub fn duration(&self) -> i64 {
        frame_to_time(self.frame_count as Frame, self.frame_rate)
    }
}

/// One encoded access unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSample {
    pub data: Arc<[u8]>,
    /// Presentation time in microseconds.
    pub time: i64,
    /// Sync sample; decoding can start here.
    pub keyframe: bool,
}

/// Source of encoded samples in decode order.
///
/// Implementations own the read position. The reader asks for one sample at a
/// time and decides through [`VideoDemuxer::try_seek`] whether a jump needs a
/// seek back to a sync sample.
pub trait VideoDemuxer: Send {
    fn format(&self) -> &VideoFormat;

    /// Time of the sample that is showing at `target_time`.
    fn sample_time_at(&self, target_time: i64) -> i64;

    /// Time of the first sample after the one showing at `target_time`, or
    /// `None` past the last sample.
    fn next_sample_time_at(&self, target_time: i64) -> Option<i64>;

    /// Reposition to the sync sample preceding `target_time` if decoding
    /// forward from `current_time` can't reach it. Returns true if it seeked.
    fn try_seek(&mut self, target_time: i64, current_time: i64) -> bool;

    /// The next sample in decode order, or `None` at the end of the stream.
    fn next_sample(&mut self) -> Option<VideoSample>;
}

/// Demuxer over samples held in memory, ordered by time.
#[derive(Debug, Clone)]
pub struct SampleDemuxer {
    format: VideoFormat,
    samples: Vec<VideoSample>,
    cursor: usize,
}

impl SampleDemuxer {
    /// `samples` must be sorted by time and start with a keyframe.
    pub fn new(format: VideoFormat, samples: Vec<VideoSample>) -> Self {
        debug_assert!(samples.windows(2).all(|pair| pair[0].time < pair[1].time));
        Self {
            format,
            samples,
            cursor: 0,
        }
    }

    pub fn samples(&self) -> &[VideoSample] {
        &self.samples
    }

    /// Index of the sample showing at `target_time`.
    fn index_at(&self, target_time: i64) -> usize {
        self.samples
            .partition_point(|sample| sample.time <= target_time)
            .saturating_sub(1)
    }

    fn keyframe_index_at(&self, target_time: i64) -> usize {
        let index = self.index_at(target_time);
        self.samples[..=index]
            .iter()
            .rposition(|sample| sample.keyframe)
            .unwrap_or(0)
    }
}

impl VideoDemuxer for SampleDemuxer {
    fn format(&self) -> &VideoFormat {
        &self.format
    }

    fn sample_time_at(&self, target_time: i64) -> i64 {
        if self.samples.is_empty() {
            return target_time;
        }
        self.samples[self.index_at(target_time)].time
    }

    fn next_sample_time_at(&self, target_time: i64) -> Option<i64> {
        let index = self.samples.partition_point(|sample| sample.time <= target_time);
        self.samples.get(index).map(|sample| sample.time)
    }

    fn try_seek(&mut self, target_time: i64, current_time: i64) -> bool {
        if self.samples.is_empty() {
            return false;
        }
        let key = self.keyframe_index_at(target_time);
        if target_time < current_time || self.samples[key].time > current_time {
            self.cursor = key;
            return true;
        }
        false
    }

    fn next_sample(&mut self) -> Option<VideoSample> {
        let sample = self.samples.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demuxer() -> SampleDemuxer {
        let format = VideoFormat {
            mime_type: "video/test".into(),
            info: ImageInfo::rgba(2, 2),
            frame_rate: 10.0,
            frame_count: 6,
            static_content: false,
        };
        let samples = (0..6)
            .map(|i| VideoSample {
                data: Arc::from(vec![i as u8]),
                time: frame_to_time(i, 10.0),
                keyframe: i % 3 == 0,
            })
            .collect();
        SampleDemuxer::new(format, samples)
    }

    #[test]
    fn test_sample_time_lookup() {
        let demuxer = demuxer();
        assert_eq!(demuxer.sample_time_at(0), 0);
        assert_eq!(demuxer.sample_time_at(150_000), 100_000);
        assert_eq!(demuxer.sample_time_at(-5), 0);
        assert_eq!(demuxer.sample_time_at(10_000_000), 500_000);
        assert_eq!(demuxer.next_sample_time_at(100_000), Some(200_000));
        assert_eq!(demuxer.next_sample_time_at(500_000), None);
        assert_eq!(demuxer.format().duration(), 600_000);
    }

    #[test]
    fn test_seek_to_preceding_keyframe() {
        let mut demuxer = demuxer();
        // Fresh stream: always position on a sync sample.
        assert!(demuxer.try_seek(400_000, i64::MIN));
        assert_eq!(demuxer.next_sample().unwrap().time, 300_000);
        // Sequential step: no seek.
        assert!(!demuxer.try_seek(400_000, 300_000));
        // Backwards jump.
        assert!(demuxer.try_seek(100_000, 400_000));
        assert_eq!(demuxer.next_sample().unwrap().time, 0);
        // Forward jump across a keyframe.
        assert!(demuxer.try_seek(500_000, 100_000));
        assert_eq!(demuxer.next_sample().unwrap().time, 300_000);
    }

    #[test]
    fn test_end_of_stream() {
        let mut demuxer = demuxer();
        assert!(demuxer.try_seek(500_000, i64::MIN));
        assert!(demuxer.next_sample().is_some());
        assert!(demuxer.next_sample().is_some());
        assert!(demuxer.next_sample().is_some());
        assert!(demuxer.next_sample().is_none());
    }
}
