//! Flipbook Disk - persistent frame cache
//!
//! Decoded frames are expensive to produce, so they are compressed and kept
//! on disk across runs:
//! - [`compressor`]: LZ4 block compression of raw pixel buffers
//! - [`SequenceFile`]: append-only, write-once store of one sequence's frames
//! - [`DiskCache`]: size-bounded LRU registry of sequence files and blobs

pub mod compressor;
pub mod config;
pub mod disk_cache;
pub mod sequence_file;

pub use compressor::CompressionType;
pub use config::DiskCacheConfig;
pub use disk_cache::{DiskCache, DiskCacheStats};
pub use sequence_file::{SequenceFile, FILE_VERSION};
