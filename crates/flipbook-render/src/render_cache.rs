//! Per-session cache of snapshots, decoded images and sequence queues.
//!
//! The renderer brackets every frame with [`RenderCache::begin_frame`] and
//! [`RenderCache::detach_from_context`]. Everything an asset needs is marked
//! live when it is requested; whatever was not requested during a frame
//! becomes an eviction candidate when the frame ends.
//!
//! Snapshot memory is bounded two ways. Nothing new is cached at or above
//! `max_graphics_memory`. Above `purgeable_graphics_memory`, unused snapshots
//! are dropped right away, and if usage stays above it for
//! `over_budget_frames` frames in a row, snapshots are dropped from the LRU
//! tail whether used or not.

use crate::config::RenderCacheConfig;
use crate::sequence::SequenceReader;
use crate::sequence_image_queue::SequenceImageQueue;
use crate::snapshot::{Snapshot, SnapshotSource};
use crate::texture::TextureImage;
use flipbook_core::{limits, AssetId, Frame, PixelBuffer, Result, Task, TaskPool};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

/// Still-image content that decodes to pixels.
pub trait ImageSource: Send + Sync {
    fn decode(&self) -> Result<PixelBuffer>;
}

/// A snapshot that was built and did not fit under the ceiling.
struct Refusal {
    content_key: u64,
    scale_factor: f32,
    size: u64,
}

enum ImageSlot {
    Pending(Task<Result<PixelBuffer>>),
    Ready(Arc<TextureImage>),
}

/// Current cache occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderCacheStats {
    pub snapshots: usize,
    pub images: usize,
    pub sequences: usize,
    pub graphics_memory: u64,
}

/// Render-thread cache. Not internally synchronized.
pub struct RenderCache {
    config: RenderCacheConfig,
    pool: Arc<TaskPool>,
    used_assets: HashSet<AssetId>,
    snapshots: HashMap<AssetId, Snapshot>,
    /// Front is most recently used.
    snapshot_lru: VecDeque<AssetId>,
    graphics_memory: u64,
    over_budget_frames: u32,
    refused: HashMap<AssetId, Refusal>,
    images: HashMap<AssetId, ImageSlot>,
    sequences: HashMap<AssetId, SequenceImageQueue>,
    used_sequences: HashSet<AssetId>,
    snapshot_enabled: bool,
    video_enabled: bool,
}

impl RenderCache {
    pub fn new(config: RenderCacheConfig) -> Self {
        Self::with_task_pool(config, TaskPool::global())
    }

    pub fn with_task_pool(config: RenderCacheConfig, pool: Arc<TaskPool>) -> Self {
        Self {
            config,
            pool,
            used_assets: HashSet::new(),
            snapshots: HashMap::new(),
            snapshot_lru: VecDeque::new(),
            graphics_memory: 0,
            over_budget_frames: 0,
            refused: HashMap::new(),
            images: HashMap::new(),
            sequences: HashMap::new(),
            used_sequences: HashSet::new(),
            snapshot_enabled: true,
            video_enabled: true,
        }
    }

    pub fn config(&self) -> &RenderCacheConfig {
        &self.config
    }

    /// Start a new frame. Nothing is live until it is requested again.
    pub fn begin_frame(&mut self) {
        self.used_assets.clear();
        self.used_sequences.clear();
    }

    /// Snapshot memory in bytes.
    pub fn memory_usage(&self) -> u64 {
        self.graphics_memory
    }

    pub fn stats(&self) -> RenderCacheStats {
        RenderCacheStats {
            snapshots: self.snapshots.len(),
            images: self.images.len(),
            sequences: self.sequences.len(),
            graphics_memory: self.graphics_memory,
        }
    }

    pub fn has_snapshot(&self, asset_id: AssetId) -> bool {
        self.snapshots.contains_key(&asset_id)
    }

    /// The snapshot of `source` at its current scale, built on a miss.
    ///
    /// `None` means the content should be drawn directly: snapshots are
    /// disabled, the content is invisible, or the memory ceiling is reached.
    pub fn get_snapshot(&mut self, source: &dyn SnapshotSource) -> Option<&Snapshot> {
        if !self.snapshot_enabled {
            return None;
        }
        let asset_id = source.asset_id();
        self.used_assets.insert(asset_id);
        let scale = source.scale_factor();
        let content_key = source.content_key();

        let hit = self.snapshots.get(&asset_id).map(|snapshot| {
            snapshot.matches(content_key, scale, limits::SCALE_FACTOR_PRECISION)
        });
        match hit {
            Some(true) => {
                self.touch(asset_id);
                return self.snapshots.get(&asset_id);
            }
            Some(false) => {
                trace!(asset_id, "Snapshot is stale");
                self.remove_snapshot(asset_id);
            }
            None => {}
        }

        if !scale.is_finite() || scale < limits::SCALE_FACTOR_PRECISION {
            return None;
        }
        if self.graphics_memory >= self.config.max_graphics_memory {
            return None;
        }
        if let Some(refusal) = self.refused.get(&asset_id) {
            let same = refusal.content_key == content_key
                && (refusal.scale_factor - scale).abs() <= limits::SCALE_FACTOR_PRECISION;
            if same && self.graphics_memory + refusal.size > self.config.max_graphics_memory {
                return None;
            }
        }
        let mipmapped = source.min_scale_factor() / scale < self.config.mipmap_threshold;
        let snapshot = source.make_snapshot(scale, mipmapped)?;
        let size = snapshot.memory_usage();
        if self.graphics_memory + size > self.config.max_graphics_memory {
            debug!(asset_id, size, used = self.graphics_memory, "Snapshot exceeds memory ceiling");
            self.refused.insert(
                asset_id,
                Refusal {
                    content_key,
                    scale_factor: scale,
                    size,
                },
            );
            return None;
        }
        self.refused.remove(&asset_id);
        self.graphics_memory += size;
        self.snapshots.insert(asset_id, snapshot);
        self.snapshot_lru.push_front(asset_id);
        self.snapshots.get(&asset_id)
    }

    /// Start decoding `source` in the background.
    pub fn prepare_asset_image(&mut self, asset_id: AssetId, source: Arc<dyn ImageSource>) {
        self.used_assets.insert(asset_id);
        if self.images.contains_key(&asset_id) || self.has_snapshot(asset_id) {
            return;
        }
        let task = self.pool.spawn(move || source.decode());
        self.images.insert(asset_id, ImageSlot::Pending(task));
    }

    /// The decoded image of `source`, joining a prepared decode if there is one.
    pub fn get_asset_image(
        &mut self,
        asset_id: AssetId,
        source: &dyn ImageSource,
    ) -> Result<Arc<TextureImage>> {
        self.used_assets.insert(asset_id);
        let pixels = match self.images.remove(&asset_id) {
            Some(ImageSlot::Ready(image)) => {
                self.images.insert(asset_id, ImageSlot::Ready(image.clone()));
                return Ok(image);
            }
            Some(ImageSlot::Pending(task)) => match task.wait() {
                Some(result) => result?,
                None => source.decode()?,
            },
            None => source.decode()?,
        };
        let image = TextureImage::upload(Arc::new(pixels), false);
        self.images.insert(asset_id, ImageSlot::Ready(image.clone()));
        Ok(image)
    }

    /// Start decoding `frame` of a sequence in the background.
    pub fn prepare_sequence_image(
        &mut self,
        asset_id: AssetId,
        reader: &Arc<dyn SequenceReader>,
        frame: Frame,
    ) {
        if let Some(queue) = self.sequence_queue(asset_id, reader) {
            queue.prepare(frame);
        }
    }

    /// The image of `frame` of a sequence. `None` if video is disabled.
    pub fn get_sequence_image(
        &mut self,
        asset_id: AssetId,
        reader: &Arc<dyn SequenceReader>,
        frame: Frame,
    ) -> Result<Option<Arc<TextureImage>>> {
        match self.sequence_queue(asset_id, reader) {
            Some(queue) => queue.get_image(frame).map(Some),
            None => Ok(None),
        }
    }

    /// End the frame: prefetch the next sequence frames and evict whatever
    /// went unused.
    pub fn detach_from_context(&mut self) {
        for asset_id in &self.used_sequences {
            if let Some(queue) = self.sequences.get_mut(asset_id) {
                queue.prepare_next();
            }
        }
        let expired: Vec<AssetId> = self
            .sequences
            .keys()
            .filter(|id| !self.used_sequences.contains(*id))
            .copied()
            .collect();
        for asset_id in expired {
            trace!(asset_id, "Releasing unused sequence");
            self.sequences.remove(&asset_id);
            self.remove_snapshot(asset_id);
        }
        let used_assets = &self.used_assets;
        self.images.retain(|asset_id, _| used_assets.contains(asset_id));
        self.refused.retain(|asset_id, _| used_assets.contains(asset_id));
        self.purge_snapshots();
    }

    pub fn set_snapshot_enabled(&mut self, enabled: bool) {
        if self.snapshot_enabled == enabled {
            return;
        }
        self.snapshot_enabled = enabled;
        if !enabled {
            self.clear_snapshots();
        }
    }

    pub fn snapshot_enabled(&self) -> bool {
        self.snapshot_enabled
    }

    pub fn set_video_enabled(&mut self, enabled: bool) {
        if self.video_enabled == enabled {
            return;
        }
        self.video_enabled = enabled;
        if !enabled {
            let videos: Vec<AssetId> = self
                .sequences
                .iter()
                .filter(|(_, queue)| queue.reader().is_video())
                .map(|(asset_id, _)| *asset_id)
                .collect();
            for asset_id in videos {
                self.sequences.remove(&asset_id);
                self.remove_snapshot(asset_id);
            }
        }
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    /// Drop everything cached for an asset that left the scene.
    pub fn remove_asset(&mut self, asset_id: AssetId) {
        self.remove_snapshot(asset_id);
        self.refused.remove(&asset_id);
        self.images.remove(&asset_id);
        self.sequences.remove(&asset_id);
        self.used_assets.remove(&asset_id);
        self.used_sequences.remove(&asset_id);
    }

    pub fn release_all(&mut self) {
        self.clear_snapshots();
        self.refused.clear();
        self.images.clear();
        self.sequences.clear();
        self.used_assets.clear();
        self.used_sequences.clear();
        self.over_budget_frames = 0;
    }

    fn sequence_queue(
        &mut self,
        asset_id: AssetId,
        reader: &Arc<dyn SequenceReader>,
    ) -> Option<&mut SequenceImageQueue> {
        if !self.video_enabled && reader.is_video() {
            return None;
        }
        self.used_assets.insert(asset_id);
        self.used_sequences.insert(asset_id);
        let stale = self
            .sequences
            .get(&asset_id)
            .is_some_and(|queue| !Arc::ptr_eq(queue.reader(), reader));
        if stale {
            self.sequences.remove(&asset_id);
        }
        let pool = &self.pool;
        Some(
            self.sequences
                .entry(asset_id)
                .or_insert_with(|| SequenceImageQueue::new(reader.clone(), pool.clone())),
        )
    }

    fn touch(&mut self, asset_id: AssetId) {
        if let Some(snapshot) = self.snapshots.get_mut(&asset_id) {
            snapshot.idle_frames = 0;
        }
        if self.snapshot_lru.front() != Some(&asset_id) {
            self.snapshot_lru.retain(|id| *id != asset_id);
            self.snapshot_lru.push_front(asset_id);
        }
    }

    fn remove_snapshot(&mut self, asset_id: AssetId) {
        if let Some(snapshot) = self.snapshots.remove(&asset_id) {
            self.graphics_memory -= snapshot.memory_usage();
            self.snapshot_lru.retain(|id| *id != asset_id);
        }
    }

    fn clear_snapshots(&mut self) {
        self.snapshots.clear();
        self.snapshot_lru.clear();
        self.graphics_memory = 0;
    }

    fn purge_snapshots(&mut self) {
        let soft = self.config.purgeable_graphics_memory;

        let idle: Vec<AssetId> = self
            .snapshot_lru
            .iter()
            .rev()
            .filter(|id| !self.used_assets.contains(*id))
            .copied()
            .collect();
        for asset_id in idle {
            let Some(snapshot) = self.snapshots.get_mut(&asset_id) else {
                continue;
            };
            snapshot.idle_frames += 1;
            if snapshot.idle_frames < self.config.expired_frames && self.graphics_memory <= soft {
                continue;
            }
            trace!(asset_id, idle_frames = snapshot.idle_frames, "Purging idle snapshot");
            self.remove_snapshot(asset_id);
        }

        if self.graphics_memory > soft {
            self.over_budget_frames += 1;
        } else {
            self.over_budget_frames = 0;
        }
        if self.over_budget_frames >= self.config.over_budget_frames {
            debug!(
                used = self.graphics_memory,
                soft,
                frames = self.over_budget_frames,
                "Snapshot memory over budget, enforcing soft limit"
            );
            while self.graphics_memory > soft {
                let Some(&asset_id) = self.snapshot_lru.back() else {
                    break;
                };
                self.remove_snapshot(asset_id);
            }
            self.over_budget_frames = 0;
        }
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(RenderCacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::BitmapFrame;
    use crate::sequence::{BitmapPatch, BitmapSequenceReader};
    use flipbook_core::{FlipbookError, ImageInfo};
    use std::cell::Cell;

    struct Source {
        id: AssetId,
        key: Cell<u64>,
        scale: Cell<f32>,
        min_scale: Cell<f32>,
        side: u32,
        builds: Cell<u32>,
    }

    impl Source {
        /// A `side`x`side` RGBA snapshot: `side * side * 4` bytes.
        fn new(id: AssetId, side: u32) -> Self {
            Self {
                id,
                key: Cell::new(1),
                scale: Cell::new(1.0),
                min_scale: Cell::new(1.0),
                side,
                builds: Cell::new(0),
            }
        }
    }

    impl SnapshotSource for Source {
        fn asset_id(&self) -> AssetId {
            self.id
        }

        fn content_key(&self) -> u64 {
            self.key.get()
        }

        fn scale_factor(&self) -> f32 {
            self.scale.get()
        }

        fn min_scale_factor(&self) -> f32 {
            self.min_scale.get()
        }

        fn make_snapshot(&self, scale_factor: f32, mipmapped: bool) -> Option<Snapshot> {
            self.builds.set(self.builds.get() + 1);
            let pixels = Arc::new(PixelBuffer::test_pattern(self.side, self.side, 0));
            let image = TextureImage::upload(pixels, mipmapped);
            Some(Snapshot::new(image, self.id, self.key.get(), scale_factor))
        }
    }

    fn config(max: u64, soft: u64) -> RenderCacheConfig {
        RenderCacheConfig {
            max_graphics_memory: max,
            purgeable_graphics_memory: soft,
            expired_frames: 3,
            over_budget_frames: 2,
            ..Default::default()
        }
    }

    fn cache(max: u64, soft: u64) -> RenderCache {
        RenderCache::with_task_pool(config(max, soft), Arc::new(TaskPool::inline()))
    }

    #[test]
    fn test_snapshot_hit_and_invalidation() {
        let mut cache = cache(10_000, 10_000);
        let source = Source::new(1, 4);
        assert!(cache.get_snapshot(&source).is_some());
        assert!(cache.get_snapshot(&source).is_some());
        assert_eq!(source.builds.get(), 1);

        source.scale.set(1.0005);
        assert!(cache.get_snapshot(&source).is_some());
        assert_eq!(source.builds.get(), 1);

        source.scale.set(0.5);
        cache.get_snapshot(&source);
        assert_eq!(source.builds.get(), 2);

        source.key.set(2);
        let snapshot = cache.get_snapshot(&source).unwrap();
        assert_eq!(snapshot.content_key, 2);
        assert_eq!(source.builds.get(), 3);
        assert_eq!(cache.memory_usage(), 64);
        assert_eq!(cache.stats().snapshots, 1);
    }

    #[test]
    fn test_invisible_content_gets_no_snapshot() {
        let mut cache = cache(10_000, 10_000);
        let source = Source::new(1, 4);
        source.scale.set(0.0);
        assert!(cache.get_snapshot(&source).is_none());
        assert_eq!(source.builds.get(), 0);
    }

    #[test]
    fn test_memory_ceiling() {
        let mut cache = cache(100, 100);
        let a = Source::new(1, 4);
        let b = Source::new(2, 4);
        assert!(cache.get_snapshot(&a).is_some());
        // 64 + 64 would pass the 100 byte ceiling.
        assert!(cache.get_snapshot(&b).is_none());
        assert!(!cache.has_snapshot(2));
        assert_eq!(cache.memory_usage(), 64);

        let mut full = RenderCache::with_task_pool(config(64, 64), Arc::new(TaskPool::inline()));
        assert!(full.get_snapshot(&a).is_some());
        assert!(full.get_snapshot(&b).is_none());
        assert_eq!(b.builds.get(), 1);
    }

    #[test]
    fn test_oversized_snapshot_is_not_rebuilt_every_frame() {
        let mut cache = cache(100, 100);
        let small = Source::new(1, 4);
        let large = Source::new(2, 5);
        assert!(cache.get_snapshot(&small).is_some());
        for _ in 0..3 {
            cache.begin_frame();
            cache.get_snapshot(&small);
            assert!(cache.get_snapshot(&large).is_none());
            cache.detach_from_context();
        }
        assert_eq!(large.builds.get(), 1);

        // Once there is room it is built again.
        cache.remove_asset(1);
        assert!(cache.get_snapshot(&large).is_some());
        assert_eq!(large.builds.get(), 2);

        // New content is always worth a try.
        let mut full = RenderCache::with_task_pool(config(100, 100), Arc::new(TaskPool::inline()));
        let other = Source::new(3, 4);
        full.get_snapshot(&small);
        full.get_snapshot(&other);
        other.key.set(9);
        full.get_snapshot(&other);
        assert_eq!(other.builds.get(), 2);
    }

    #[test]
    fn test_mipmaps_for_content_shown_small() {
        let mut cache = cache(10_000, 10_000);
        let source = Source::new(1, 4);
        source.min_scale.set(0.25);
        assert!(cache.get_snapshot(&source).unwrap().image.is_mipmapped());
        assert_eq!(cache.memory_usage(), 64 + 21);

        let plain = Source::new(2, 4);
        plain.min_scale.set(0.75);
        assert!(!cache.get_snapshot(&plain).unwrap().image.is_mipmapped());
    }

    #[test]
    fn test_idle_snapshots_expire() {
        let mut cache = cache(10_000, 10_000);
        let kept = Source::new(1, 4);
        let idle = Source::new(2, 4);
        cache.begin_frame();
        cache.get_snapshot(&kept);
        cache.get_snapshot(&idle);
        cache.detach_from_context();

        for frame in 1..=3 {
            assert!(cache.has_snapshot(2), "evicted early at frame {frame}");
            cache.begin_frame();
            cache.get_snapshot(&kept);
            cache.detach_from_context();
        }
        assert!(!cache.has_snapshot(2));
        assert!(cache.has_snapshot(1));
        assert_eq!(cache.memory_usage(), 64);
    }

    #[test]
    fn test_unused_snapshots_purged_above_soft_limit() {
        let mut cache = cache(10_000, 64);
        let a = Source::new(1, 4);
        let b = Source::new(2, 4);
        cache.begin_frame();
        cache.get_snapshot(&a);
        cache.get_snapshot(&b);
        cache.detach_from_context();
        assert_eq!(cache.memory_usage(), 128);

        cache.begin_frame();
        cache.get_snapshot(&b);
        cache.detach_from_context();
        assert!(!cache.has_snapshot(1));
        assert_eq!(cache.memory_usage(), 64);
    }

    #[test]
    fn test_soft_limit_enforced_after_sustained_overrun() {
        let mut cache = cache(10_000, 64);
        let a = Source::new(1, 4);
        let b = Source::new(2, 4);

        cache.begin_frame();
        cache.get_snapshot(&a);
        cache.get_snapshot(&b);
        cache.detach_from_context();
        assert_eq!(cache.memory_usage(), 128);

        cache.begin_frame();
        cache.get_snapshot(&a);
        cache.get_snapshot(&b);
        cache.detach_from_context();
        // `a` was used least recently.
        assert!(!cache.has_snapshot(1));
        assert!(cache.has_snapshot(2));
        assert_eq!(cache.memory_usage(), 64);
    }

    struct Solid(u8);

    impl ImageSource for Solid {
        fn decode(&self) -> Result<PixelBuffer> {
            PixelBuffer::from_vec(ImageInfo::rgba(2, 2), vec![self.0; 16])
        }
    }

    struct Broken;

    impl ImageSource for Broken {
        fn decode(&self) -> Result<PixelBuffer> {
            Err(FlipbookError::Codec("truncated".into()))
        }
    }

    #[test]
    fn test_asset_images() {
        let mut cache = cache(10_000, 10_000);
        let source: Arc<dyn ImageSource> = Arc::new(Solid(9));
        cache.begin_frame();
        cache.prepare_asset_image(5, source.clone());
        let image = cache.get_asset_image(5, source.as_ref()).unwrap();
        assert_eq!(image.pixels().pixels(), &[9; 16]);
        let again = cache.get_asset_image(5, source.as_ref()).unwrap();
        assert!(Arc::ptr_eq(&image, &again));
        assert!(cache.get_asset_image(6, &Broken).is_err());
        cache.detach_from_context();
        assert_eq!(cache.stats().images, 1);

        cache.begin_frame();
        cache.detach_from_context();
        assert_eq!(cache.stats().images, 0);
    }

    fn bitmap_sequence() -> Arc<dyn SequenceReader> {
        let info = ImageInfo::rgba(2, 2);
        let frames = (0..4)
            .map(|i| {
                let pixels = PixelBuffer::from_vec(info, vec![i as u8; 16]).unwrap();
                BitmapFrame::key(vec![BitmapPatch::new(0, 0, &pixels)])
            })
            .collect();
        Arc::new(BitmapSequenceReader::new(info, 24.0, frames).unwrap())
    }

    #[test]
    fn test_sequences_prefetch_and_expire() {
        let mut cache = cache(10_000, 10_000);
        let reader = bitmap_sequence();

        cache.begin_frame();
        let image = cache.get_sequence_image(3, &reader, 1).unwrap().unwrap();
        assert_eq!(image.pixels().pixels(), &[1; 16]);
        cache.detach_from_context();
        assert_eq!(cache.sequences.get(&3).and_then(|q| q.staged_frame()), Some(2));

        cache.begin_frame();
        let image = cache.get_sequence_image(3, &reader, 2).unwrap().unwrap();
        assert_eq!(image.pixels().pixels(), &[2; 16]);
        cache.detach_from_context();

        cache.begin_frame();
        cache.detach_from_context();
        assert_eq!(cache.stats().sequences, 0);
    }

    #[test]
    fn test_disabling_toggles_clear_caches() {
        let mut cache = cache(10_000, 10_000);
        let source = Source::new(1, 4);
        cache.get_snapshot(&source);
        cache.set_snapshot_enabled(false);
        assert_eq!(cache.memory_usage(), 0);
        assert!(cache.get_snapshot(&source).is_none());
        cache.set_snapshot_enabled(true);
        assert!(cache.get_snapshot(&source).is_some());

        cache.release_all();
        assert_eq!(cache.stats(), RenderCacheStats::default());
    }

    #[test]
    fn test_snapshotted_asset_skips_image_decode() {
        struct Counting(std::sync::atomic::AtomicUsize);

        impl ImageSource for Counting {
            fn decode(&self) -> Result<PixelBuffer> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                PixelBuffer::from_vec(ImageInfo::rgba(1, 1), vec![0; 4])
            }
        }

        let mut cache = cache(10_000, 10_000);
        let counting = Arc::new(Counting(std::sync::atomic::AtomicUsize::new(0)));
        cache.get_snapshot(&Source::new(4, 4));
        cache.prepare_asset_image(4, counting.clone());
        assert_eq!(counting.0.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(cache.stats().images, 0);

        cache.prepare_asset_image(5, counting.clone());
        assert_eq!(counting.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_asset() {
        let mut cache = cache(10_000, 10_000);
        let source = Source::new(1, 4);
        cache.get_snapshot(&source);
        cache.get_asset_image(1, &Solid(1)).unwrap();
        cache.remove_asset(1);
        assert!(!cache.has_snapshot(1));
        assert_eq!(cache.stats(), RenderCacheStats::default());
    }
}
