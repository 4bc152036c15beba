//! Append-only persistent store of compressed frames.
//!
//! # File layout
//!
//! All integers are little-endian.
//!
//! ```text
//! header   version:u8 compression:u8 color_type:u8 alpha_type:u8
//!          width:u32 height:u32 row_bytes:u32 frame_count:u32
//!          frame_rate:f32 range_count:u32
//!          range_count x { start:u32 end:u32 }
//! records  { index:u32 size:u64 payload[size] } ...
//! ```
//!
//! Records are appended in write order. A frame inside a static range is
//! stored once, under the range's first frame, and every frame of the range
//! resolves to that record.

use crate::compressor::{self, CompressionType};
use crate::disk_cache::CacheShared;
use flipbook_core::{
    find_range, FlipbookError, ImageInfo, PixelBuffer, Result, TimeRange, TimeRanges,
};
use flipbook_core::{AlphaType, ColorType};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Format version written into every header.
pub const FILE_VERSION: u8 = 1;

/// Size of the fixed part of the file header.
pub const FILE_HEAD_SIZE: usize = 28;

/// Size of one static range record in the header.
pub const RANGE_RECORD_SIZE: usize = 8;

/// Size of the record header preceding each frame payload.
pub const FRAME_HEAD_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FrameLocation {
    /// Payload offset in the file.
    offset: u64,
    /// Compressed payload size; 0 means not cached.
    size: u64,
}

/// Back reference to the disk cache that registered this file.
pub(crate) struct CacheLink {
    pub(crate) cache: Weak<CacheShared>,
    pub(crate) file_id: u32,
}

/// Decoded form of the file header.
#[derive(Debug, Clone, PartialEq)]
struct SequenceHeader {
    version: u8,
    compression: u8,
    info: ImageInfo,
    frame_count: u32,
    frame_rate: f32,
    static_ranges: Vec<TimeRange>,
}

impl SequenceHeader {
    fn encoded_len(&self) -> usize {
        FILE_HEAD_SIZE + self.static_ranges.len() * RANGE_RECORD_SIZE
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(self.version);
        out.push(self.compression);
        out.push(self.info.color_type as u8);
        out.push(self.info.alpha_type as u8);
        out.extend_from_slice(&self.info.width.to_le_bytes());
        out.extend_from_slice(&self.info.height.to_le_bytes());
        out.extend_from_slice(&self.info.row_bytes.to_le_bytes());
        out.extend_from_slice(&self.frame_count.to_le_bytes());
        out.extend_from_slice(&self.frame_rate.to_le_bytes());
        out.extend_from_slice(&(self.static_ranges.len() as u32).to_le_bytes());
        for range in &self.static_ranges {
            out.extend_from_slice(&(range.start as u32).to_le_bytes());
            out.extend_from_slice(&(range.end as u32).to_le_bytes());
        }
        out
    }

    fn decode(reader: &mut impl Read, file_len: u64) -> Result<Self> {
        let mut head = [0u8; FILE_HEAD_SIZE];
        reader
            .read_exact(&mut head)
            .map_err(|_| FlipbookError::Corrupted("truncated header".into()))?;
        let color_type = ColorType::from_u8(head[2])
            .ok_or_else(|| FlipbookError::Corrupted(format!("color type {}", head[2])))?;
        let alpha_type = AlphaType::from_u8(head[3])
            .ok_or_else(|| FlipbookError::Corrupted(format!("alpha type {}", head[3])))?;
        let info = ImageInfo {
            width: le_u32(&head[4..8]),
            height: le_u32(&head[8..12]),
            color_type,
            alpha_type,
            row_bytes: le_u32(&head[12..16]),
        };
        let frame_count = le_u32(&head[16..20]);
        let frame_rate = f32::from_le_bytes([head[20], head[21], head[22], head[23]]);
        let range_count = le_u32(&head[24..28]) as u64;
        if FILE_HEAD_SIZE as u64 + range_count * RANGE_RECORD_SIZE as u64 > file_len {
            return Err(FlipbookError::Corrupted("truncated static ranges".into()));
        }
        let mut static_ranges = Vec::with_capacity(range_count as usize);
        let mut record = [0u8; RANGE_RECORD_SIZE];
        for _ in 0..range_count {
            reader
                .read_exact(&mut record)
                .map_err(|_| FlipbookError::Corrupted("truncated static ranges".into()))?;
            static_ranges.push(TimeRange::new(
                le_u32(&record[0..4]) as i64,
                le_u32(&record[4..8]) as i64,
            ));
        }
        Ok(Self {
            version: head[0],
            compression: head[1],
            info,
            frame_count,
            frame_rate,
            static_ranges,
        })
    }
}

#[inline]
fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

/// Mutable state, guarded by the per-file lock.
struct FileState {
    /// `None` once the file has been closed.
    file: Option<File>,
    frames: Vec<FrameLocation>,
    cached_frames: u32,
    file_size: u64,
    /// Compression scratch space; released once every frame is cached.
    scratch: Vec<u8>,
}

impl FileState {
    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| FlipbookError::Internal("sequence file is closed".into()))
    }
}

/// A persistent, append-only store of compressed frames for one sequence.
///
/// Each frame is written at most once. Reads and writes from different
/// threads are serialized by an internal lock.
pub struct SequenceFile {
    path: PathBuf,
    header: SequenceHeader,
    header_bytes: Vec<u8>,
    static_ranges: TimeRanges,
    state: Mutex<FileState>,
    link: Option<CacheLink>,
}

impl SequenceFile {
    /// Open or create a standalone sequence file at `path`.
    ///
    /// An existing file whose header differs from the given parameters, or
    /// whose records are damaged, is reset to empty.
    pub fn open(
        path: impl AsRef<Path>,
        info: ImageInfo,
        frame_count: u32,
        frame_rate: f32,
        static_ranges: &[TimeRange],
    ) -> Result<Arc<Self>> {
        Self::open_linked(path.as_ref(), info, frame_count, frame_rate, static_ranges, None)
    }

    pub(crate) fn open_linked(
        path: &Path,
        info: ImageInfo,
        frame_count: u32,
        frame_rate: f32,
        static_ranges: &[TimeRange],
        link: Option<CacheLink>,
    ) -> Result<Arc<Self>> {
        validate_params(path, &info, frame_count, frame_rate, static_ranges)?;
        let header = SequenceHeader {
            version: FILE_VERSION,
            compression: CompressionType::default().id(),
            info,
            frame_count,
            frame_rate,
            static_ranges: static_ranges.to_vec(),
        };
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut frames = vec![FrameLocation::default(); frame_count as usize];
        let mut cached_frames = 0;
        let mut file_size = file.metadata()?.len();
        if file_size > 0 {
            match replay_records(&mut file, file_size, &header) {
                Ok((replayed, cached)) => {
                    frames = replayed;
                    cached_frames = cached;
                    debug!(path = %path.display(), cached, "Reopened sequence file");
                }
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "Resetting sequence file");
                    file.set_len(0)?;
                    file_size = 0;
                }
            }
        }

        let header_bytes = header.encode();
        Ok(Arc::new(Self {
            path: path.to_path_buf(),
            header,
            header_bytes,
            static_ranges: static_ranges.iter().copied().collect(),
            state: Mutex::new(FileState {
                file: Some(file),
                frames,
                cached_frames,
                file_size,
                scratch: Vec::new(),
            }),
            link,
        }))
    }

    /// Decode frame `index` into `output`.
    pub fn read_frame(&self, index: u32, output: &mut PixelBuffer) -> Result<()> {
        self.check_index(index)?;
        self.check_shape(output)?;

        let mut state = self.state.lock();
        let location = state.frames[index as usize];
        if location.size == 0 {
            return Err(FlipbookError::FrameNotCached(index));
        }
        if location.size > compressor::max_compressed_size(self.info().byte_size()) as u64 {
            return Err(FlipbookError::Corrupted(format!(
                "frame {index} claims {} compressed bytes",
                location.size
            )));
        }
        self.ensure_scratch(&mut state);
        let size = location.size as usize;
        if state.scratch.len() < size {
            state.scratch.resize(size, 0);
        }

        let FileState { file, scratch, .. } = &mut *state;
        let file = file
            .as_mut()
            .ok_or_else(|| FlipbookError::Internal("sequence file is closed".into()))?;
        file.seek(SeekFrom::Start(location.offset))?;
        file.read_exact(&mut scratch[..size])?;
        compressor::decompress_into(&scratch[..size], output.pixels_mut())
    }

    /// Compress and append frame `index`.
    ///
    /// A frame inside a static range is stored once for the whole range.
    /// Writing a frame that is already cached fails with
    /// [`FlipbookError::FrameAlreadyWritten`].
    pub fn write_frame(&self, index: u32, pixels: &PixelBuffer) -> Result<()> {
        self.check_index(index)?;
        self.check_shape(pixels)?;

        let range = find_range(&self.static_ranges, index as i64)
            .copied()
            .unwrap_or_else(|| TimeRange::new(index as i64, index as i64));
        let representative = range.start as u32;

        let file_size = {
            let mut state = self.state.lock();
            if state.frames[index as usize].size != 0
                || state.frames[representative as usize].size != 0
            {
                return Err(FlipbookError::FrameAlreadyWritten(index));
            }
            self.append_record(&mut state, representative, pixels)?;

            let location = state.frames[representative as usize];
            for frame in range.start..=range.end {
                state.frames[frame as usize] = location;
            }
            state.cached_frames += range.frame_count() as u32;
            if state.cached_frames >= self.num_frames() {
                state.scratch = Vec::new();
                debug!(path = %self.path.display(), "Sequence file complete");
            }
            state.file_size
        };

        // Never call into the cache while holding the file lock.
        self.notify_size_changed(file_size);
        Ok(())
    }

    fn append_record(
        &self,
        state: &mut FileState,
        representative: u32,
        pixels: &PixelBuffer,
    ) -> Result<()> {
        self.ensure_scratch(state);
        let payload_size = {
            let (head, body) = state.scratch.split_at_mut(FRAME_HEAD_SIZE);
            let size = compressor::compress_into(pixels.pixels(), body)?;
            head[0..4].copy_from_slice(&representative.to_le_bytes());
            head[4..12].copy_from_slice(&(size as u64).to_le_bytes());
            size
        };

        let start_size = state.file_size;
        let written = {
            let FileState {
                file,
                scratch,
                file_size,
                ..
            } = &mut *state;
            let file = file
                .as_mut()
                .ok_or_else(|| FlipbookError::Internal("sequence file is closed".into()))?;
            write_record(
                file,
                file_size,
                &self.header_bytes,
                &scratch[..FRAME_HEAD_SIZE + payload_size],
            )
        };
        if let Err(e) = written {
            // Drop the partial record so the next open doesn't reset the file.
            let rollback = state.file()?.set_len(start_size);
            if let Err(rollback) = rollback {
                warn!(path = %self.path.display(), error = %rollback, "Failed to roll back partial frame");
            }
            state.file_size = start_size;
            return Err(e);
        }

        let offset = state.file_size + FRAME_HEAD_SIZE as u64;
        state.frames[representative as usize] = FrameLocation {
            offset,
            size: payload_size as u64,
        };
        state.file_size += (FRAME_HEAD_SIZE + payload_size) as u64;
        Ok(())
    }

    fn ensure_scratch(&self, state: &mut FileState) {
        if !state.scratch.is_empty() {
            return;
        }
        let size = if state.cached_frames >= self.num_frames() {
            state.frames.iter().map(|f| f.size as usize).max().unwrap_or(0)
        } else {
            FRAME_HEAD_SIZE + compressor::max_compressed_size(self.info().byte_size())
        };
        state.scratch = vec![0u8; size];
    }

    fn check_index(&self, index: u32) -> Result<()> {
        if index >= self.num_frames() {
            return Err(FlipbookError::FrameOutOfRange {
                index: index as i64,
                count: self.num_frames(),
            });
        }
        Ok(())
    }

    fn check_shape(&self, pixels: &PixelBuffer) -> Result<()> {
        if pixels.info() != self.info() {
            return Err(FlipbookError::ShapeMismatch(format!(
                "{:?} does not match sequence {:?}",
                pixels.info(),
                self.info()
            )));
        }
        Ok(())
    }

    fn notify_size_changed(&self, file_size: u64) {
        if let Some(link) = &self.link {
            if let Some(cache) = link.cache.upgrade() {
                cache.notify_size_changed(link.file_id, file_size);
            }
        }
    }

    /// True if the given parameters describe this file's content.
    pub fn is_compatible(
        &self,
        info: &ImageInfo,
        frame_count: u32,
        frame_rate: f32,
        static_ranges: &[TimeRange],
    ) -> bool {
        self.header.info == *info
            && self.header.frame_count == frame_count
            && self.header.frame_rate == frame_rate
            && self.header.static_ranges.as_slice() == static_ranges
    }

    /// True once every frame has been written.
    pub fn is_complete(&self) -> bool {
        self.state.lock().cached_frames >= self.num_frames()
    }

    /// Number of frames readable so far, counting every frame of a static range.
    pub fn cached_frame_count(&self) -> u32 {
        self.state.lock().cached_frames
    }

    pub fn is_frame_cached(&self, index: u32) -> bool {
        self.state
            .lock()
            .frames
            .get(index as usize)
            .is_some_and(|f| f.size != 0)
    }

    /// Current length of the file on disk.
    pub fn file_size(&self) -> u64 {
        self.state.lock().file_size
    }

    pub fn num_frames(&self) -> u32 {
        self.header.frame_count
    }

    pub fn info(&self) -> &ImageInfo {
        &self.header.info
    }

    pub fn width(&self) -> u32 {
        self.header.info.width
    }

    pub fn height(&self) -> u32 {
        self.header.info.height
    }

    pub fn frame_rate(&self) -> f32 {
        self.header.frame_rate
    }

    pub fn static_time_ranges(&self) -> &[TimeRange] {
        &self.static_ranges
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Id assigned by the disk cache, if this file is cache-managed.
    pub fn file_id(&self) -> Option<u32> {
        self.link.as_ref().map(|link| link.file_id)
    }
}

impl Drop for SequenceFile {
    fn drop(&mut self) {
        // Close the handle before the cache decides whether to delete the file.
        self.state.get_mut().file = None;
        if let Some(link) = &self.link {
            if let Some(cache) = link.cache.upgrade() {
                cache.notify_closed(link.file_id);
            }
        }
    }
}

impl std::fmt::Debug for SequenceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceFile")
            .field("path", &self.path)
            .field("info", &self.header.info)
            .field("frame_count", &self.header.frame_count)
            .field("frame_rate", &self.header.frame_rate)
            .finish_non_exhaustive()
    }
}

fn validate_params(
    path: &Path,
    info: &ImageInfo,
    frame_count: u32,
    frame_rate: f32,
    static_ranges: &[TimeRange],
) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(FlipbookError::InvalidParameter("empty sequence file path".into()));
    }
    if info.is_empty() || (info.row_bytes as usize) < info.min_row_bytes() {
        return Err(FlipbookError::InvalidParameter(format!(
            "unusable pixel descriptor {info:?}"
        )));
    }
    if frame_count == 0 {
        return Err(FlipbookError::InvalidParameter("frame count is zero".into()));
    }
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Err(FlipbookError::InvalidParameter(format!(
            "frame rate {frame_rate}"
        )));
    }
    for range in static_ranges {
        if !range.is_valid() || range.end >= frame_count as i64 {
            return Err(FlipbookError::InvalidParameter(format!(
                "static range {}..={} outside {} frames",
                range.start, range.end, frame_count
            )));
        }
    }
    let mut sorted: Vec<TimeRange> = static_ranges.to_vec();
    sorted.sort_by_key(|range| range.start);
    for pair in sorted.windows(2) {
        if pair[1].start <= pair[0].end {
            return Err(FlipbookError::InvalidParameter(format!(
                "static ranges {}..={} and {}..={} overlap",
                pair[0].start, pair[0].end, pair[1].start, pair[1].end
            )));
        }
    }
    Ok(())
}

/// Parse the header and replay every record of an existing file.
fn replay_records(
    file: &mut File,
    file_len: u64,
    expected: &SequenceHeader,
) -> Result<(Vec<FrameLocation>, u32)> {
    file.seek(SeekFrom::Start(0))?;
    let header = SequenceHeader::decode(file, file_len)?;
    if header != *expected {
        return Err(FlipbookError::Corrupted("header mismatch".into()));
    }

    let frame_count = expected.frame_count as usize;
    let mut frames = vec![FrameLocation::default(); frame_count];
    let mut cached_frames = 0u32;
    let mut position = header.encoded_len() as u64;
    let mut head = [0u8; FRAME_HEAD_SIZE];
    while position < file_len {
        if file_len - position < FRAME_HEAD_SIZE as u64 {
            return Err(FlipbookError::Corrupted("truncated frame record".into()));
        }
        file.seek(SeekFrom::Start(position))?;
        file.read_exact(&mut head)?;
        let index = le_u32(&head[0..4]);
        let size = le_u64(&head[4..12]);
        if index as usize >= frame_count {
            return Err(FlipbookError::Corrupted(format!("frame index {index}")));
        }
        let range = find_range(&expected.static_ranges, index as i64)
            .copied()
            .unwrap_or_else(|| TimeRange::new(index as i64, index as i64));
        if range.start != index as i64 {
            return Err(FlipbookError::Corrupted(format!(
                "frame {index} is inside static range {}..={}",
                range.start, range.end
            )));
        }
        if frames[index as usize].size != 0 {
            return Err(FlipbookError::Corrupted(format!("duplicate frame {index}")));
        }
        let offset = position + FRAME_HEAD_SIZE as u64;
        if size == 0 || size > file_len - offset {
            return Err(FlipbookError::Corrupted(format!(
                "frame {index} payload of {size} bytes"
            )));
        }
        let location = FrameLocation { offset, size };
        for frame in range.start..=range.end {
            frames[frame as usize] = location;
        }
        cached_frames += range.frame_count() as u32;
        position = offset + size;
    }
    Ok((frames, cached_frames))
}

/// Append one record, writing the header first if the file is empty.
fn write_record(
    file: &mut File,
    file_size: &mut u64,
    header: &[u8],
    record: &[u8],
) -> Result<()> {
    if *file_size == 0 {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(header)?;
        *file_size = header.len() as u64;
    }
    file.seek(SeekFrom::Start(*file_size))?;
    file.write_all(record)?;
    Ok(())
}
