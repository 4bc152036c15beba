use super::{check_frame, SequenceReader};
use flipbook_core::{
    FlipbookError, Frame, ImageInfo, PixelBuffer, Result, SharedPixels, TimeRange, TimeRanges,
};
use flipbook_disk::compressor;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// A compressed rectangle of pixels drawn at `(x, y)`.
#[derive(Debug, Clone)]
pub struct BitmapPatch {
    pub x: u32,
    pub y: u32,
    info: ImageInfo,
    data: Vec<u8>,
}

impl BitmapPatch {
    pub fn new(x: u32, y: u32, pixels: &PixelBuffer) -> Self {
        Self {
            x,
            y,
            info: *pixels.info(),
            data: compressor::compress(pixels.pixels()),
        }
    }

    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    fn decode(&self) -> Result<PixelBuffer> {
        let pixels = compressor::decompress(&self.data, self.info.byte_size())?;
        PixelBuffer::from_vec(self.info, pixels)
    }
}

/// One frame of a bitmap sequence.
///
/// A keyframe starts from a cleared canvas; other frames patch the previous
/// frame. A non-key frame without patches repeats the previous frame.
#[derive(Debug, Clone)]
pub struct BitmapFrame {
    pub keyframe: bool,
    pub patches: Vec<BitmapPatch>,
}

impl BitmapFrame {
    pub fn key(patches: Vec<BitmapPatch>) -> Self {
        Self { keyframe: true, patches }
    }

    pub fn delta(patches: Vec<BitmapPatch>) -> Self {
        Self { keyframe: false, patches }
    }
}

struct Canvas {
    pixels: PixelBuffer,
    decoded: Option<Frame>,
}

/// Decodes keyframe + patch bitmap sequences.
///
/// Frames are composited in order on one canvas. A request behind the canvas
/// or past a keyframe restarts at the nearest preceding keyframe.
pub struct BitmapSequenceReader {
    info: ImageInfo,
    frame_rate: f32,
    frames: Vec<BitmapFrame>,
    static_ranges: TimeRanges,
    canvas: Mutex<Canvas>,
}

impl BitmapSequenceReader {
    pub fn new(info: ImageInfo, frame_rate: f32, frames: Vec<BitmapFrame>) -> Result<Self> {
        if info.is_empty() {
            return Err(FlipbookError::InvalidParameter("empty bitmap sequence size".into()));
        }
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(FlipbookError::InvalidParameter(format!("frame rate {frame_rate}")));
        }
        match frames.first() {
            Some(first) if first.keyframe => {}
            _ => {
                return Err(FlipbookError::InvalidParameter(
                    "bitmap sequence must start with a keyframe".into(),
                ))
            }
        }
        for (index, frame) in frames.iter().enumerate() {
            for patch in &frame.patches {
                let fits = patch.x as u64 + patch.info.width as u64 <= info.width as u64
                    && patch.y as u64 + patch.info.height as u64 <= info.height as u64;
                if !fits || patch.info.color_type != info.color_type {
                    return Err(FlipbookError::ShapeMismatch(format!(
                        "frame {index}: {}x{} patch at ({}, {}) on a {}x{} canvas",
                        patch.info.width, patch.info.height, patch.x, patch.y, info.width, info.height
                    )));
                }
            }
        }
        let static_ranges = static_ranges_of(&frames);
        Ok(Self {
            info,
            frame_rate,
            frames,
            static_ranges,
            canvas: Mutex::new(Canvas {
                pixels: PixelBuffer::new(info),
                decoded: None,
            }),
        })
    }

    fn draw(&self, canvas: &mut PixelBuffer, index: usize) -> Result<()> {
        let frame = &self.frames[index];
        if frame.keyframe {
            canvas.pixels_mut().fill(0);
        }
        let bpp = self.info.bytes_per_pixel();
        for patch in &frame.patches {
            let pixels = patch.decode()?;
            let start = patch.x as usize * bpp;
            let end = start + patch.info.min_row_bytes();
            for row in 0..patch.info.height {
                canvas.row_mut(patch.y + row)[start..end].copy_from_slice(pixels.row(row));
            }
        }
        Ok(())
    }
}

/// Runs of patch-less delta frames repeat the frame before them.
fn static_ranges_of(frames: &[BitmapFrame]) -> TimeRanges {
    let mut ranges = TimeRanges::new();
    let mut start = 0usize;
    for index in 1..=frames.len() {
        let repeats = frames
            .get(index)
            .is_some_and(|frame| !frame.keyframe && frame.patches.is_empty());
        if !repeats {
            if index - 1 > start {
                ranges.push(TimeRange::new(start as Frame, (index - 1) as Frame));
            }
            start = index;
        }
    }
    ranges
}

impl SequenceReader for BitmapSequenceReader {
    fn info(&self) -> ImageInfo {
        self.info
    }

    fn frame_count(&self) -> u32 {
        self.frames.len() as u32
    }

    fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    fn static_time_ranges(&self) -> &[TimeRange] {
        &self.static_ranges
    }

    fn read_frame(&self, frame: Frame) -> Result<SharedPixels> {
        let index = check_frame(frame, self.frame_count())? as usize;
        let mut canvas = self.canvas.lock();
        if canvas.decoded == Some(frame) {
            return Ok(Arc::new(canvas.pixels.clone()));
        }
        let keyframe = (0..=index).rev().find(|&i| self.frames[i].keyframe).unwrap_or(0);
        let start = match canvas.decoded {
            Some(decoded) if decoded >= keyframe as Frame && decoded < frame => decoded as usize + 1,
            _ => keyframe,
        };
        trace!(frame, start, "Decoding bitmap frames");
        canvas.decoded = None;
        for i in start..=index {
            self.draw(&mut canvas.pixels, i)?;
        }
        canvas.decoded = Some(frame);
        Ok(Arc::new(canvas.pixels.clone()))
    }
}
