//! Error types for flipbook.

use thiserror::Error;

/// Main error type for flipbook operations.
#[derive(Error, Debug)]
pub enum FlipbookError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Frame {index} out of range (frame count {count})")]
    FrameOutOfRange { index: i64, count: u32 },

    #[error("Pixel shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Frame {0} is not cached")]
    FrameNotCached(u32),

    #[error("Frame {0} is already written")]
    FrameAlreadyWritten(u32),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("Disk quota exceeded: {requested} bytes requested, limit is {limit}")]
    QuotaExceeded { requested: u64, limit: u64 },

    #[error("File is busy: {0}")]
    FileBusy(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("All video decoders failed")]
    DecoderExhausted,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for flipbook operations.
pub type Result<T> = std::result::Result<T, FlipbookError>;
