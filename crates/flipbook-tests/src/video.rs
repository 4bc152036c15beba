//! Integration tests for decoder fallback feeding the sequence cache.

use crate::init_tracing;
use flipbook_core::{FlipbookError, PixelBuffer, Result};
use flipbook_disk::{DiskCache, DiskCacheConfig};
use flipbook_render::{CachedSequenceReader, SequenceReader, VideoSequenceReader};
use flipbook_video::{
    encode_frames, DecodingPolicy, DecodingResult, DeltaDecoderFactory, VideoBuffer, VideoDecoder,
    VideoDecoderFactory, VideoFormat, VideoReader,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A hardware decoder that accepts input but never produces a frame.
struct FailingHardware {
    created: AtomicUsize,
}

struct FailingDecoder;

impl VideoDecoder for FailingDecoder {
    fn on_send_bytes(&mut self, _data: &[u8], _time: i64) -> DecodingResult {
        DecodingResult::Success
    }

    fn on_end_of_stream(&mut self) -> DecodingResult {
        DecodingResult::Success
    }

    fn on_decode_frame(&mut self) -> DecodingResult {
        DecodingResult::Error
    }

    fn on_flush(&mut self) {}

    fn presentation_time(&self) -> i64 {
        -1
    }

    fn on_render_frame(&mut self) -> Option<Arc<VideoBuffer>> {
        None
    }
}

impl VideoDecoderFactory for FailingHardware {
    fn name(&self) -> &str {
        "failing-hardware"
    }

    fn is_hardware_backed(&self) -> bool {
        true
    }

    fn create(&self, _format: &VideoFormat) -> Result<Box<dyn VideoDecoder>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FailingDecoder))
    }
}

fn frames() -> Vec<PixelBuffer> {
    // Large enough that the hardware-first policy is not overridden.
    (0..4).map(|i| PixelBuffer::test_pattern(480, 360, i)).collect()
}

#[test]
fn hardware_failure_falls_back_to_software_for_good() {
    init_tracing();
    let frames = frames();
    let hardware = Arc::new(FailingHardware {
        created: AtomicUsize::new(0),
    });
    let factories: Vec<Arc<dyn VideoDecoderFactory>> =
        vec![hardware.clone(), Arc::new(DeltaDecoderFactory)];
    let reader = VideoReader::new(
        Box::new(encode_frames(&frames, 30.0, 2).unwrap()),
        &factories,
        DecodingPolicy::Hardware,
    );

    let sequence = VideoSequenceReader::new(reader);
    for index in 0..4 {
        assert_eq!(*sequence.read_frame(index).unwrap(), frames[index as usize]);
    }
    assert_eq!(sequence.reader().active_decoder().as_deref(), Some("delta-software"));
    assert!(!sequence.reader().is_hardware_active());
    assert_eq!(hardware.created.load(Ordering::SeqCst), 1);
}

#[test]
fn exhausted_decoders_surface_an_error() {
    let frames = frames();
    let factories: Vec<Arc<dyn VideoDecoderFactory>> = vec![Arc::new(FailingHardware {
        created: AtomicUsize::new(0),
    })];
    let reader = VideoReader::new(
        Box::new(encode_frames(&frames, 30.0, 2).unwrap()),
        &factories,
        DecodingPolicy::Hardware,
    );
    let sequence = VideoSequenceReader::new(reader);
    assert!(matches!(sequence.read_frame(0), Err(FlipbookError::DecoderExhausted)));
}

#[test]
fn decoded_video_is_replayed_from_disk() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let cache = DiskCache::new(DiskCacheConfig::new(tmp.path()));
    let frames = frames();
    let factories: Vec<Arc<dyn VideoDecoderFactory>> = vec![Arc::new(DeltaDecoderFactory)];

    let open = |cache: &DiskCache| {
        let reader = VideoReader::new(
            Box::new(encode_frames(&frames, 30.0, 2).unwrap()),
            &factories,
            DecodingPolicy::Software,
        );
        let inner: Arc<dyn SequenceReader> = Arc::new(VideoSequenceReader::new(reader));
        CachedSequenceReader::open(cache, "movie.delta", inner).unwrap()
    };

    let first = open(&cache);
    for index in (0..4).rev() {
        assert_eq!(*first.read_frame(index).unwrap(), frames[index as usize]);
    }
    assert!(first.file().is_complete());
    drop(first);

    let second = open(&cache);
    assert!(second.file().is_complete());
    assert!(second.is_video());
    assert_eq!(*second.read_frame(2).unwrap(), frames[2]);
}
