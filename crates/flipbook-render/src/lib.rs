//! Flipbook Render - the renderer-facing cache
//!
//! - [`RenderCache`]: per-session snapshot LRU, decoded images and sequence
//!   queues with frame-scoped liveness
//! - [`SequenceImageQueue`]: one-frame-ahead prefetch of sequence frames
//! - [`sequence`]: video, bitmap and disk-backed frame readers
//! - [`GpuImage`]: the image handle the cache accounts memory against

pub mod config;
pub mod render_cache;
pub mod sequence;
pub mod sequence_image_queue;
pub mod snapshot;
pub mod texture;

pub use config::RenderCacheConfig;
pub use render_cache::{ImageSource, RenderCache, RenderCacheStats};
pub use sequence::{
    BitmapFrame, BitmapPatch, BitmapSequenceReader, CachedSequenceReader, SequenceReader,
    VideoSequenceReader,
};
pub use sequence_image_queue::SequenceImageQueue;
pub use snapshot::{Snapshot, SnapshotSource};
pub use texture::{GpuImage, Image, TextureImage};
