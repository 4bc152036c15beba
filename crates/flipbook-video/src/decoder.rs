//! Decoder and decoder-factory interfaces.

use crate::demuxer::VideoFormat;
use flipbook_core::{limits, Result, SharedPixels};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of one decoder step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingResult {
    Success,
    /// The decoder needs more input or time before it can make progress.
    TryAgainLater,
    Error,
    EndOfStream,
}

/// A decoded video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoBuffer {
    pub pixels: SharedPixels,
    /// Presentation time in microseconds.
    pub time: i64,
}

/// A stateful video decoder.
///
/// Input and output are decoupled: bytes go in through `on_send_bytes`, each
/// `on_decode_frame` call advances the pipeline by at most one frame, and
/// `on_render_frame` materializes the most recent frame.
pub trait VideoDecoder: Send {
    fn on_send_bytes(&mut self, data: &[u8], time: i64) -> DecodingResult;

    /// Signal that no more input will arrive.
    fn on_end_of_stream(&mut self) -> DecodingResult;

    fn on_decode_frame(&mut self) -> DecodingResult;

    /// Drop all buffered input and reference state.
    fn on_flush(&mut self);

    /// Presentation time of the most recently decoded frame.
    fn presentation_time(&self) -> i64;

    fn on_render_frame(&mut self) -> Option<Arc<VideoBuffer>>;
}

/// Constructs decoders of one kind.
pub trait VideoDecoderFactory: Send + Sync {
    fn name(&self) -> &str;

    fn is_hardware_backed(&self) -> bool;

    fn create(&self, format: &VideoFormat) -> Result<Box<dyn VideoDecoder>>;
}

/// Which decoders to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DecodingPolicy {
    /// Hardware first, software as fallback.
    #[default]
    Hardware,
    /// Software first, hardware as fallback.
    Software,
    /// Start in software and switch to hardware once it has been built in the
    /// background.
    SoftwareToHardware,
}

impl DecodingPolicy {
    /// The policy actually applied to `format`.
    ///
    /// Small and mostly-static videos are cheaper to decode in software.
    pub fn resolve(self, format: &VideoFormat) -> Self {
        if format.info.pixel_area() <= limits::FORCE_SOFTWARE_SIZE || format.static_content {
            return Self::Software;
        }
        self
    }
}

/// Order `factories` for `policy`, keeping the relative order within each kind.
///
/// A software-first policy only takes effect if a software factory exists.
pub fn order_factories(
    factories: &[Arc<dyn VideoDecoderFactory>],
    policy: DecodingPolicy,
) -> Vec<Arc<dyn VideoDecoderFactory>> {
    let (hardware, software): (Vec<_>, Vec<_>) = factories
        .iter()
        .cloned()
        .partition(|factory| factory.is_hardware_backed());
    let software_first = match policy {
        DecodingPolicy::Hardware => false,
        DecodingPolicy::Software | DecodingPolicy::SoftwareToHardware => !software.is_empty(),
    };
    if software_first {
        software.into_iter().chain(hardware).collect()
    } else {
        hardware.into_iter().chain(software).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flipbook_core::{FlipbookError, ImageInfo};

    struct Named(&'static str, bool);

    impl VideoDecoderFactory for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn is_hardware_backed(&self) -> bool {
            self.1
        }

        fn create(&self, _format: &VideoFormat) -> Result<Box<dyn VideoDecoder>> {
            Err(FlipbookError::Decoder("unused".into()))
        }
    }

    fn names(factories: &[Arc<dyn VideoDecoderFactory>]) -> Vec<&str> {
        factories.iter().map(|f| f.name()).collect()
    }

    fn format(width: u32, height: u32) -> VideoFormat {
        VideoFormat {
            mime_type: "video/test".into(),
            info: ImageInfo::rgba(width, height),
            frame_rate: 30.0,
            frame_count: 1,
            static_content: false,
        }
    }

    #[test]
    fn test_factory_ordering() {
        let factories: Vec<Arc<dyn VideoDecoderFactory>> = vec![
            Arc::new(Named("soft-a", false)),
            Arc::new(Named("hard", true)),
            Arc::new(Named("soft-b", false)),
        ];
        assert_eq!(
            names(&order_factories(&factories, DecodingPolicy::Hardware)),
            ["hard", "soft-a", "soft-b"]
        );
        assert_eq!(
            names(&order_factories(&factories, DecodingPolicy::Software)),
            ["soft-a", "soft-b", "hard"]
        );
    }

    #[test]
    fn test_software_first_needs_a_software_factory() {
        let factories: Vec<Arc<dyn VideoDecoderFactory>> = vec![Arc::new(Named("hard", true))];
        assert_eq!(
            names(&order_factories(&factories, DecodingPolicy::Software)),
            ["hard"]
        );
    }

    #[test]
    fn test_small_or_static_videos_use_software() {
        assert_eq!(
            DecodingPolicy::Hardware.resolve(&format(400, 400)),
            DecodingPolicy::Software
        );
        assert_eq!(
            DecodingPolicy::Hardware.resolve(&format(1280, 720)),
            DecodingPolicy::Hardware
        );
        let mut still = format(1280, 720);
        still.static_content = true;
        assert_eq!(
            DecodingPolicy::SoftwareToHardware.resolve(&still),
            DecodingPolicy::Software
        );
    }
}
