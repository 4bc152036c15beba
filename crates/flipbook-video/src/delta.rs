//! Built-in software codec: keyframes carry raw pixels, the frames between
//! them carry an XOR delta against the previous frame.
//!
//! It exists so sequences rendered by the engine itself can be stored as a
//! video stream without an external codec, and it keeps the full decoder
//! contract (reference frames, flush, end of stream) honest in tests.

use crate::decoder::{DecodingResult, VideoBuffer, VideoDecoder, VideoDecoderFactory};
use crate::demuxer::{SampleDemuxer, VideoFormat, VideoSample};
use flipbook_core::{frame_to_time, FlipbookError, ImageInfo, PixelBuffer, Result};
use std::sync::Arc;
use tracing::warn;

pub const DELTA_MIME_TYPE: &str = "video/x-flipbook-delta";

const KEYFRAME_TAG: u8 = 0;
const DELTA_TAG: u8 = 1;

/// Encode `frames` into a demuxable stream with a keyframe every
/// `keyframe_interval` frames.
pub fn encode_frames(
    frames: &[PixelBuffer],
    frame_rate: f32,
    keyframe_interval: usize,
) -> Result<SampleDemuxer> {
    let first = frames
        .first()
        .ok_or_else(|| FlipbookError::InvalidParameter("no frames to encode".into()))?;
    let info = *first.info();
    let interval = keyframe_interval.max(1);
    let mut samples = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        if frame.info() != &info {
            return Err(FlipbookError::ShapeMismatch(format!(
                "frame {index} is {:?}, stream is {:?}",
                frame.info(),
                info
            )));
        }
        let keyframe = index % interval == 0;
        let mut data = Vec::with_capacity(frame.memory_size() + 1);
        if keyframe {
            data.push(KEYFRAME_TAG);
            data.extend_from_slice(frame.pixels());
        } else {
            data.push(DELTA_TAG);
            let previous = frames[index - 1].pixels();
            data.extend(frame.pixels().iter().zip(previous).map(|(a, b)| a ^ b));
        }
        samples.push(VideoSample {
            data: Arc::from(data),
            time: frame_to_time(index as i64, frame_rate),
            keyframe,
        });
    }
    let format = VideoFormat {
        mime_type: DELTA_MIME_TYPE.to_string(),
        info,
        frame_rate,
        frame_count: frames.len() as u32,
        static_content: false,
    };
    Ok(SampleDemuxer::new(format, samples))
}

/// Software decoder for [`encode_frames`] streams. Holds one input sample.
pub struct DeltaDecoder {
    info: ImageInfo,
    input: Option<(Vec<u8>, i64)>,
    reference: Option<PixelBuffer>,
    time: i64,
    end_of_stream: bool,
}

impl DeltaDecoder {
    pub fn new(info: ImageInfo) -> Self {
        Self {
            info,
            input: None,
            reference: None,
            time: i64::MIN,
            end_of_stream: false,
        }
    }

    fn decode(&mut self, data: &[u8], time: i64) -> DecodingResult {
        let Some((&tag, payload)) = data.split_first() else {
            return DecodingResult::Error;
        };
        if payload.len() != self.info.byte_size() {
            warn!(len = payload.len(), expected = self.info.byte_size(), "Bad sample size");
            return DecodingResult::Error;
        }
        match tag {
            KEYFRAME_TAG => match PixelBuffer::from_vec(self.info, payload.to_vec()) {
                Ok(frame) => self.reference = Some(frame),
                Err(_) => return DecodingResult::Error,
            },
            DELTA_TAG => {
                let Some(reference) = self.reference.as_mut() else {
                    // A delta without its reference frame is undecodable.
                    return DecodingResult::Error;
                };
                for (pixel, delta) in reference.pixels_mut().iter_mut().zip(payload) {
                    *pixel ^= delta;
                }
            }
            _ => return DecodingResult::Error,
        }
        self.time = time;
        DecodingResult::Success
    }
}

impl VideoDecoder for DeltaDecoder {
    fn on_send_bytes(&mut self, data: &[u8], time: i64) -> DecodingResult {
        if self.input.is_some() {
            return DecodingResult::TryAgainLater;
        }
        self.input = Some((data.to_vec(), time));
        DecodingResult::Success
    }

    fn on_end_of_stream(&mut self) -> DecodingResult {
        self.end_of_stream = true;
        DecodingResult::Success
    }

    fn on_decode_frame(&mut self) -> DecodingResult {
        match self.input.take() {
            Some((data, time)) => self.decode(&data, time),
            None if self.end_of_stream => DecodingResult::EndOfStream,
            None => DecodingResult::TryAgainLater,
        }
    }

    fn on_flush(&mut self) {
        self.input = None;
        self.reference = None;
        self.time = i64::MIN;
        self.end_of_stream = false;
    }

    fn presentation_time(&self) -> i64 {
        self.time
    }

    fn on_render_frame(&mut self) -> Option<Arc<VideoBuffer>> {
        let pixels = Arc::new(self.reference.clone()?);
        Some(Arc::new(VideoBuffer {
            pixels,
            time: self.time,
        }))
    }
}

/// Factory for [`DeltaDecoder`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DeltaDecoderFactory;

impl VideoDecoderFactory for DeltaDecoderFactory {
    fn name(&self) -> &str {
        "delta-software"
    }

    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn create(&self, format: &VideoFormat) -> Result<Box<dyn VideoDecoder>> {
        if format.mime_type != DELTA_MIME_TYPE {
            return Err(FlipbookError::Decoder(format!(
                "unsupported stream {}",
                format.mime_type
            )));
        }
        Ok(Box::new(DeltaDecoder::new(format.info)))
    }
}
