//! Frame and sample-time conversions.
//!
//! Frames are zero-based indices; sample times are integer microseconds,
//! which is what demuxers report.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A zero-based frame index.
pub type Frame = i64;

/// Microseconds per second.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Convert a frame index to its start time in microseconds.
#[inline]
pub fn frame_to_time(frame: Frame, frame_rate: f32) -> i64 {
    if frame_rate <= 0.0 {
        return 0;
    }
    (frame as f64 * MICROS_PER_SECOND / frame_rate as f64).ceil() as i64
}

/// Convert a time in microseconds to the frame that is showing at that time.
#[inline]
pub fn time_to_frame(time: i64, frame_rate: f32) -> Frame {
    if frame_rate <= 0.0 {
        return 0;
    }
    (time as f64 * frame_rate as f64 / MICROS_PER_SECOND).floor() as Frame
}

/// An inclusive span of frames `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Frame,
    pub end: Frame,
}

impl TimeRange {
    #[inline]
    pub fn new(start: Frame, end: Frame) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, frame: Frame) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Number of frames covered by the range.
    #[inline]
    pub fn frame_count(&self) -> i64 {
        (self.end - self.start + 1).max(0)
    }

    pub fn is_valid(&self) -> bool {
        self.start >= 0 && self.end >= self.start
    }
}

/// Static time ranges of a sequence. Most sequences carry only a few.
pub type TimeRanges = SmallVec<[TimeRange; 4]>;

/// Find the static range containing `frame`, if any.
pub fn find_range(ranges: &[TimeRange], frame: Frame) -> Option<&TimeRange> {
    ranges.iter().find(|range| range.contains(frame))
}
