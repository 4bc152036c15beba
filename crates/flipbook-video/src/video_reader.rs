//! Frame-accurate video reading on top of a demuxer and a list of decoder
//! factories.
//!
//! The reader drives the active decoder until its output reaches the
//! requested sample time. A failed decode is retried once on the same
//! decoder after resetting its parameters; a second failure destroys the
//! decoder and moves on to the next factory.

use crate::decoder::{
    order_factories, DecodingPolicy, DecodingResult, VideoBuffer, VideoDecoder,
    VideoDecoderFactory,
};
use crate::demuxer::{VideoDemuxer, VideoFormat, VideoSample};
use flipbook_core::{frame_to_time, limits, FlipbookError, Frame, Result, Task, TaskPool};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sentinel for "no time yet".
const NO_TIME: i64 = i64::MIN;

/// Decode state of a [`VideoReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Seeking,
    Decoding,
    WaitingForOutput,
    EndOfStream,
    Error,
}

/// Accumulated decode timings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub hardware_decoding_time: Duration,
    pub software_decoding_time: Duration,
    pub hardware_init_time: Duration,
    pub software_init_time: Duration,
    pub frames_rendered: u64,
}

struct ActiveDecoder {
    decoder: Box<dyn VideoDecoder>,
    name: String,
    hardware: bool,
}

type DecoderBuild = Result<Box<dyn VideoDecoder>>;

struct HardwareBuild {
    task: Task<DecoderBuild>,
    factory: Arc<dyn VideoDecoderFactory>,
    started: Instant,
}

struct ReaderInner {
    demuxer: Box<dyn VideoDemuxer>,
    format: VideoFormat,
    factories: Vec<Arc<dyn VideoDecoderFactory>>,
    factory_index: usize,
    active: Option<ActiveDecoder>,
    hardware_build: Option<HardwareBuild>,
    state: ReaderState,
    decoded_time: i64,
    rendered_time: i64,
    pending: Option<VideoSample>,
    input_end_of_stream: bool,
    output_end_of_stream: bool,
    output: Option<Arc<VideoBuffer>>,
    stats: DecodeStats,
}

/// Reads decoded frames from an encoded video stream.
///
/// Safe to share between a decode-ahead task and the render thread; all
/// decoding happens under an internal lock.
pub struct VideoReader {
    inner: Mutex<ReaderInner>,
    format: VideoFormat,
}

impl VideoReader {
    /// Create a reader that builds any background decoder on the global pool.
    pub fn new(
        demuxer: Box<dyn VideoDemuxer>,
        factories: &[Arc<dyn VideoDecoderFactory>],
        policy: DecodingPolicy,
    ) -> Self {
        Self::with_task_pool(demuxer, factories, policy, &TaskPool::global())
    }

    pub fn with_task_pool(
        demuxer: Box<dyn VideoDemuxer>,
        factories: &[Arc<dyn VideoDecoderFactory>],
        policy: DecodingPolicy,
        pool: &TaskPool,
    ) -> Self {
        let format = demuxer.format().clone();
        let policy = policy.resolve(&format);
        let factories = order_factories(factories, policy);

        let mut hardware_build = None;
        if policy == DecodingPolicy::SoftwareToHardware && !factories.is_empty() {
            let first_is_software = !factories[0].is_hardware_backed();
            if let Some(factory) = factories.iter().find(|f| f.is_hardware_backed()) {
                if first_is_software {
                    let factory = factory.clone();
                    let job_factory = factory.clone();
                    let job_format = format.clone();
                    debug!(factory = factory.name(), "Building hardware decoder in background");
                    hardware_build = Some(HardwareBuild {
                        task: pool.spawn(move || job_factory.create(&job_format)),
                        factory,
                        started: Instant::now(),
                    });
                }
            }
        }

        Self {
            inner: Mutex::new(ReaderInner {
                demuxer,
                format: format.clone(),
                factories,
                factory_index: 0,
                active: None,
                hardware_build,
                state: ReaderState::Idle,
                decoded_time: NO_TIME,
                rendered_time: NO_TIME,
                pending: None,
                input_end_of_stream: false,
                output_end_of_stream: false,
                output: None,
                stats: DecodeStats::default(),
            }),
            format,
        }
    }

    pub fn format(&self) -> &VideoFormat {
        &self.format
    }

    /// Sample time of the frame showing at `frame`.
    pub fn sample_time_at(&self, frame: Frame) -> i64 {
        let target = frame_to_time(frame, self.format.frame_rate);
        self.inner.lock().demuxer.sample_time_at(target)
    }

    /// Decode and return the buffer for `frame`.
    ///
    /// `Ok(None)` means the stream ended before a new buffer was produced;
    /// callers keep showing what they have. An error means every decoder
    /// failed for this frame; the reader stays usable for later frames.
    pub fn make_buffer(&self, frame: Frame) -> Result<Option<Arc<VideoBuffer>>> {
        let target = frame_to_time(frame, self.format.frame_rate);
        let mut inner = self.inner.lock();
        let sample_time = inner.demuxer.sample_time_at(target);
        if sample_time == inner.rendered_time {
            if let Some(output) = &inner.output {
                return Ok(Some(output.clone()));
            }
        }

        match inner.render_frame(sample_time) {
            Ok(buffer) => Ok(buffer),
            Err(first) => {
                warn!(frame, error = %first, "Decoder failed, falling back to the next one");
                inner.destroy_decoder();
                inner.factory_index += 1;
                let result = inner.render_frame(sample_time);
                if result.is_err() && inner.active.is_none() {
                    // Every factory failed; start over on the next request.
                    warn!(frame, "All video decoders failed");
                    inner.factory_index = 0;
                    return Err(FlipbookError::DecoderExhausted);
                }
                result
            }
        }
    }

    pub fn state(&self) -> ReaderState {
        self.inner.lock().state
    }

    pub fn stats(&self) -> DecodeStats {
        self.inner.lock().stats
    }

    /// Name of the factory that built the active decoder.
    pub fn active_decoder(&self) -> Option<String> {
        self.inner.lock().active.as_ref().map(|a| a.name.clone())
    }

    pub fn is_hardware_active(&self) -> bool {
        self.inner.lock().active.as_ref().is_some_and(|a| a.hardware)
    }
}

impl ReaderInner {
    fn render_frame(&mut self, sample_time: i64) -> Result<Option<Arc<VideoBuffer>>> {
        let started = Instant::now();
        let decoded = self.decode_frame(sample_time);
        if let Some(active) = &self.active {
            if active.hardware {
                self.stats.hardware_decoding_time += started.elapsed();
            } else {
                self.stats.software_decoding_time += started.elapsed();
            }
        }
        if let Err(e) = decoded {
            self.output = None;
            self.rendered_time = NO_TIME;
            self.state = ReaderState::Error;
            return Err(e);
        }
        if self.output_end_of_stream {
            self.state = ReaderState::EndOfStream;
            return Ok(None);
        }

        let active = self
            .active
            .as_mut()
            .ok_or(FlipbookError::DecoderExhausted)?;
        match active.decoder.on_render_frame() {
            Some(buffer) => {
                self.rendered_time = self.decoded_time;
                self.output = Some(buffer.clone());
                self.stats.frames_rendered += 1;
                self.state = ReaderState::Decoding;
                Ok(Some(buffer))
            }
            None => {
                self.rendered_time = NO_TIME;
                self.output = None;
                self.state = ReaderState::Error;
                Err(FlipbookError::Decoder(format!(
                    "{} produced no output",
                    active.name
                )))
            }
        }
    }

    fn decode_frame(&mut self, sample_time: i64) -> Result<()> {
        self.ensure_decoder();
        if self.active.is_none() {
            return Err(FlipbookError::DecoderExhausted);
        }
        if self.decode_until(sample_time).is_ok() {
            return Ok(());
        }

        // Retry once on the same decoder from a clean slate.
        self.reset_params();
        let Err(retry) = self.decode_until(sample_time) else {
            return Ok(());
        };

        let failed = self.active.as_ref().map(|a| a.name.clone()).unwrap_or_default();
        warn!(factory = %failed, error = %retry, "Decoder failed twice, switching");
        self.destroy_decoder();
        self.factory_index += 1;
        self.ensure_decoder();
        if self.active.is_none() {
            return Err(retry);
        }
        self.decode_until(sample_time)
    }

    fn decode_until(&mut self, sample_time: i64) -> Result<()> {
        if self.demuxer.try_seek(sample_time, self.decoded_time) {
            self.state = ReaderState::Seeking;
            self.reset_params();
            if let Some(active) = self.active.as_mut() {
                active.decoder.on_flush();
            }
        }

        let mut tries = 0u32;
        while self.decoded_time < sample_time {
            self.send_sample()?;
            let active = self
                .active
                .as_mut()
                .ok_or(FlipbookError::DecoderExhausted)?;
            match active.decoder.on_decode_frame() {
                DecodingResult::Success => {
                    tries = 0;
                    self.decoded_time = active.decoder.presentation_time();
                    self.state = ReaderState::Decoding;
                }
                DecodingResult::EndOfStream => {
                    self.output_end_of_stream = true;
                    return Ok(());
                }
                DecodingResult::TryAgainLater => {
                    self.state = ReaderState::WaitingForOutput;
                    tries += 1;
                    if tries > limits::MAX_TRY_DECODE_COUNT {
                        warn!(sample_time, tries, "Decoder made no progress");
                        return Err(FlipbookError::Decoder("decode retry ceiling reached".into()));
                    }
                }
                DecodingResult::Error => {
                    return Err(FlipbookError::Decoder(format!(
                        "{} failed to decode at {}",
                        active.name, sample_time
                    )));
                }
            }
        }
        Ok(())
    }

    /// Feed the pending sample, or end of stream, to the decoder.
    fn send_sample(&mut self) -> Result<()> {
        if self.input_end_of_stream {
            return Ok(());
        }
        if self.pending.is_none() {
            self.pending = self.demuxer.next_sample();
        }
        let active = self
            .active
            .as_mut()
            .ok_or(FlipbookError::DecoderExhausted)?;
        match self.pending.take() {
            Some(sample) => match active.decoder.on_send_bytes(&sample.data, sample.time) {
                DecodingResult::Success => {}
                DecodingResult::Error => {
                    return Err(FlipbookError::Decoder(format!(
                        "{} rejected sample at {}",
                        active.name, sample.time
                    )))
                }
                DecodingResult::TryAgainLater | DecodingResult::EndOfStream => {
                    self.pending = Some(sample);
                }
            },
            None => match active.decoder.on_end_of_stream() {
                DecodingResult::Success => self.input_end_of_stream = true,
                DecodingResult::Error => {
                    return Err(FlipbookError::Decoder("end of stream rejected".into()))
                }
                DecodingResult::TryAgainLater | DecodingResult::EndOfStream => {}
            },
        }
        Ok(())
    }

    /// Make sure a decoder is active, switching to a finished background
    /// hardware build first.
    fn ensure_decoder(&mut self) {
        let build_finished = self
            .hardware_build
            .as_mut()
            .is_some_and(|build| build.task.is_finished());
        if build_finished && self.switch_to_hardware_build() {
            return;
        }
        if self.active.is_some() {
            return;
        }
        while self.factory_index < self.factories.len() {
            let factory = self.factories[self.factory_index].clone();
            let started = Instant::now();
            let created = factory.create(&self.format);
            let elapsed = started.elapsed();
            if factory.is_hardware_backed() {
                self.stats.hardware_init_time += elapsed;
            } else {
                self.stats.software_init_time += elapsed;
            }
            match created {
                Ok(decoder) => {
                    info!(factory = factory.name(), "Video decoder created");
                    self.active = Some(ActiveDecoder {
                        decoder,
                        name: factory.name().to_string(),
                        hardware: factory.is_hardware_backed(),
                    });
                    return;
                }
                Err(e) => {
                    warn!(factory = factory.name(), error = %e, "Failed to create video decoder");
                    self.factory_index += 1;
                }
            }
        }
        if self.hardware_build.is_some() {
            self.switch_to_hardware_build();
        }
    }

    fn switch_to_hardware_build(&mut self) -> bool {
        let Some(build) = self.hardware_build.take() else {
            return false;
        };
        let HardwareBuild {
            task,
            factory,
            started,
        } = build;
        match task.wait() {
            Some(Ok(decoder)) => {
                self.destroy_decoder();
                self.stats.hardware_init_time += started.elapsed();
                if let Some(index) = self
                    .factories
                    .iter()
                    .position(|f| Arc::ptr_eq(f, &factory))
                {
                    self.factory_index = index;
                }
                info!(factory = factory.name(), "Switched to hardware decoder");
                self.active = Some(ActiveDecoder {
                    decoder,
                    name: factory.name().to_string(),
                    hardware: true,
                });
                true
            }
            Some(Err(e)) => {
                warn!(factory = factory.name(), error = %e, "Background hardware decoder failed");
                false
            }
            None => false,
        }
    }

    fn destroy_decoder(&mut self) {
        if self.active.take().is_none() {
            return;
        }
        self.output = None;
        self.rendered_time = NO_TIME;
        self.state = ReaderState::Idle;
        self.reset_params();
    }

    fn reset_params(&mut self) {
        self.decoded_time = NO_TIME;
        self.pending = None;
        self.input_end_of_stream = false;
        self.output_end_of_stream = false;
    }
}
