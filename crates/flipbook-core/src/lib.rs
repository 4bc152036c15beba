//! Flipbook Core - Foundation types for frame caching and decoding
//!
//! This crate provides the fundamental types shared by the cache crates:
//! - Pixel descriptors and decoded frame buffers
//! - Frame/time conversion and static time ranges
//! - The background task pool used for decode work
//! - Tunable cache and decoding policy limits

pub mod error;
pub mod frame;
pub mod task;
pub mod time;

pub use error::{FlipbookError, Result};
pub use frame::{AlphaType, ColorType, ImageInfo, PixelBuffer, SharedPixels};
pub use task::{Task, TaskPool};
pub use time::{find_range, frame_to_time, time_to_frame, Frame, TimeRange, TimeRanges};

/// Identifier of a piece of visual content, used as the render cache key.
pub type AssetId = u64;

/// Policy limits for the caches and the video decoders.
///
/// These are tuning knobs, not correctness invariants.
pub mod limits {
    /// Default disk budget of the sequence cache.
    pub const DEFAULT_MAX_DISK_SIZE: u64 = 1024 * 1024 * 1024; // 1 GB

    /// Hard ceiling on snapshot memory; nothing new is cached above it.
    pub const MAX_GRAPHICS_MEMORY: u64 = 300 * 1024 * 1024; // 300 MB

    /// Above this, idle snapshots are purged right away.
    pub const PURGEABLE_GRAPHICS_MEMORY: u64 = 20 * 1024 * 1024; // 20 MB

    /// Snapshots unused for this many frames are purged.
    pub const PURGEABLE_EXPIRED_FRAME: u32 = 10;

    /// Consecutive over-budget frames before the soft cap is enforced outright.
    pub const OVER_BUDGET_FRAMES: u32 = 30;

    /// Two scale factors closer than this are considered equal.
    pub const SCALE_FACTOR_PRECISION: f32 = 0.001;

    /// Mipmaps are generated when min scale / current scale drops below this.
    pub const MIPMAP_ENABLED_THRESHOLD: f32 = 0.5;

    /// Upper bound of consecutive "try again later" results per decode call.
    pub const MAX_TRY_DECODE_COUNT: u32 = 100;

    /// Videos at or below this pixel area prefer software decoding (400x400).
    pub const FORCE_SOFTWARE_SIZE: u64 = 160_000;
}
