//! One-frame-ahead prefetch for sequence content.

use crate::sequence::SequenceReader;
use crate::texture::TextureImage;
use flipbook_core::{find_range, Frame, Result, SharedPixels, Task, TaskPool};
use std::sync::Arc;
use tracing::{debug, trace};

/// Decodes the next frame of a sequence in the background while the current
/// one is on screen.
///
/// At most one frame is staged. Asking for any other frame discards the
/// staged result and decodes synchronously.
pub struct SequenceImageQueue {
    reader: Arc<dyn SequenceReader>,
    pool: Arc<TaskPool>,
    first_frame: Frame,
    current: Option<(Frame, Arc<TextureImage>)>,
    staged: Option<(Frame, Task<Result<SharedPixels>>)>,
}

impl SequenceImageQueue {
    pub fn new(reader: Arc<dyn SequenceReader>, pool: Arc<TaskPool>) -> Self {
        Self {
            reader,
            pool,
            first_frame: 0,
            current: None,
            staged: None,
        }
    }

    /// Frame that playback loops back to.
    pub fn with_first_frame(mut self, frame: Frame) -> Self {
        self.first_frame = self.normalize(frame);
        self
    }

    pub fn reader(&self) -> &Arc<dyn SequenceReader> {
        &self.reader
    }

    /// Frame of the image last returned by [`get_image`](Self::get_image).
    pub fn current_frame(&self) -> Option<Frame> {
        self.current.as_ref().map(|(frame, _)| *frame)
    }

    /// Frame being decoded ahead, if any.
    pub fn staged_frame(&self) -> Option<Frame> {
        self.staged.as_ref().map(|(frame, _)| *frame)
    }

    /// Start decoding `frame` in the background.
    pub fn prepare(&mut self, frame: Frame) {
        let frame = self.normalize(frame);
        if self.current_frame() == Some(frame) || self.staged_frame() == Some(frame) {
            return;
        }
        // A stale job keeps running; its result is dropped with the handle.
        self.staged = None;
        let reader = self.reader.clone();
        trace!(frame, "Staging sequence frame");
        let task = self.pool.spawn(move || reader.read_frame(frame));
        self.staged = Some((frame, task));
    }

    /// Stage the frame after the current one, looping at the end.
    pub fn prepare_next(&mut self) {
        let next = match self.current_frame() {
            Some(current) => {
                let end = find_range(self.reader.static_time_ranges(), current)
                    .map_or(current, |range| range.end);
                if end + 1 >= self.reader.frame_count() as Frame {
                    self.first_frame
                } else {
                    end + 1
                }
            }
            None => self.first_frame,
        };
        self.prepare(next);
    }

    /// The image for `frame`.
    pub fn get_image(&mut self, frame: Frame) -> Result<Arc<TextureImage>> {
        let frame = self.normalize(frame);
        if let Some((current, image)) = &self.current {
            if *current == frame {
                return Ok(image.clone());
            }
        }

        let mut pixels = None;
        match self.staged.take() {
            Some((staged, task)) if staged == frame => match task.wait() {
                Some(Ok(decoded)) => pixels = Some(decoded),
                Some(Err(e)) => debug!(frame, error = %e, "Staged decode failed, retrying"),
                None => debug!(frame, "Staged decode panicked, retrying"),
            },
            Some((staged, _)) => trace!(staged, frame, "Discarding stale staged frame"),
            None => {}
        }
        let pixels = match pixels {
            Some(pixels) => pixels,
            None => self.reader.read_frame(frame)?,
        };
        let image = TextureImage::upload(pixels, false);
        self.current = Some((frame, image.clone()));
        Ok(image)
    }

    /// Clamp into the sequence and map static frames to their range start.
    fn normalize(&self, frame: Frame) -> Frame {
        let last = (self.reader.frame_count() as Frame - 1).max(0);
        let frame = frame.clamp(0, last);
        find_range(self.reader.static_time_ranges(), frame).map_or(frame, |range| range.start)
    }
}
