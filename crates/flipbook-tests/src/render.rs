//! Integration tests for the render cache over real sequence readers.

use crate::init_tracing;
use flipbook_core::{ImageInfo, PixelBuffer, TaskPool};
use flipbook_disk::{DiskCache, DiskCacheConfig};
use flipbook_render::{
    BitmapFrame, BitmapPatch, BitmapSequenceReader, CachedSequenceReader, RenderCache,
    RenderCacheConfig, SequenceImageQueue, SequenceReader, Snapshot, SnapshotSource,
    TextureImage,
};
use std::sync::Arc;

fn flipbook(frames: u8) -> Arc<dyn SequenceReader> {
    let info = ImageInfo::rgba(16, 16);
    let frames = (0..frames)
        .map(|i| {
            let patch = PixelBuffer::from_vec(ImageInfo::rgba(4, 4), vec![i + 1; 64]).unwrap();
            if i % 3 == 0 {
                BitmapFrame::key(vec![BitmapPatch::new(0, 0, &patch)])
            } else {
                BitmapFrame::delta(vec![BitmapPatch::new(4 * i as u32 % 16, 8, &patch)])
            }
        })
        .collect();
    Arc::new(BitmapSequenceReader::new(info, 12.0, frames).unwrap())
}

#[test]
fn skipping_the_prefetched_frame_returns_the_requested_frame() {
    init_tracing();
    let reader = flipbook(8);
    let reference = flipbook(8);
    let pool = Arc::new(TaskPool::new(2).unwrap());
    let mut queue = SequenceImageQueue::new(reader, pool);

    let frame = 3;
    queue.get_image(frame).unwrap();
    queue.prepare_next();
    assert_eq!(queue.staged_frame(), Some(frame + 1));

    let image = queue.get_image(frame + 2).unwrap();
    assert_eq!(**image.pixels(), *reference.read_frame(frame + 2).unwrap());
    assert_eq!(queue.current_frame(), Some(frame + 2));
    assert_eq!(queue.staged_frame(), None);
}

#[test]
fn render_loop_over_a_disk_cached_sequence() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let disk = DiskCache::new(DiskCacheConfig::new(tmp.path()));
    let reference = flipbook(6);
    let reader: Arc<dyn SequenceReader> =
        Arc::new(CachedSequenceReader::open(&disk, "flipbook", flipbook(6)).unwrap());

    let mut cache = RenderCache::with_task_pool(
        RenderCacheConfig::default(),
        Arc::new(TaskPool::new(2).unwrap()),
    );
    // Two full loops: the second is served from disk and prefetch.
    for frame in 0..12 {
        let frame = frame % 6;
        cache.begin_frame();
        let image = cache.get_sequence_image(1, &reader, frame).unwrap().unwrap();
        assert_eq!(**image.pixels(), *reference.read_frame(frame).unwrap(), "frame {frame}");
        cache.detach_from_context();
    }
    assert!(disk.contains("flipbook"));
    assert_eq!(cache.stats().sequences, 1);
}

struct Layer {
    id: u64,
    scale: f32,
}

impl SnapshotSource for Layer {
    fn asset_id(&self) -> u64 {
        self.id
    }

    fn content_key(&self) -> u64 {
        0
    }

    fn scale_factor(&self) -> f32 {
        self.scale
    }

    fn make_snapshot(&self, scale_factor: f32, mipmapped: bool) -> Option<Snapshot> {
        let side = (64.0 * scale_factor) as u32;
        let pixels = Arc::new(PixelBuffer::test_pattern(side, side, self.id as u32));
        let image = TextureImage::upload(pixels, mipmapped);
        Some(Snapshot::new(image, self.id, 0, scale_factor))
    }
}

#[test]
fn abandoned_snapshots_are_eventually_released() {
    let config = RenderCacheConfig {
        max_graphics_memory: 1 << 20,
        purgeable_graphics_memory: 1 << 20,
        expired_frames: 4,
        over_budget_frames: 8,
        ..Default::default()
    };
    let mut cache = RenderCache::with_task_pool(config, Arc::new(TaskPool::inline()));
    let layers: Vec<_> = (0..10).map(|id| Layer { id, scale: 1.0 }).collect();

    for (frame, layer) in layers.iter().enumerate() {
        cache.begin_frame();
        assert!(cache.get_snapshot(layer).is_some(), "frame {frame}");
        assert!(cache.memory_usage() <= 1 << 20);
        cache.detach_from_context();
    }
    // Only the layers drawn in the last four frames survive.
    let live: Vec<u64> = (0..10).filter(|&id| cache.has_snapshot(id)).collect();
    assert_eq!(live, vec![6, 7, 8, 9]);
    assert_eq!(cache.memory_usage(), 4 * 64 * 64 * 4);
}
