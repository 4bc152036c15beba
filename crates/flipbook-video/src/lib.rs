//! Flipbook Video - resilient frame decoding
//!
//! This crate handles:
//! - Demuxed sample streams and sync-sample seeking
//! - The decoder and decoder-factory interfaces
//! - Hardware/software decoder ordering and fallback
//! - A built-in software delta codec

pub mod decoder;
pub mod delta;
pub mod demuxer;
pub mod video_reader;

pub use decoder::{
    order_factories, DecodingPolicy, DecodingResult, VideoBuffer, VideoDecoder,
    VideoDecoderFactory,
};
pub use delta::{encode_frames, DeltaDecoderFactory};
pub use demuxer::{SampleDemuxer, VideoDemuxer, VideoFormat, VideoSample};
pub use video_reader::{DecodeStats, ReaderState, VideoReader};
