//! Integration tests for the persistent sequence cache.

use crate::{init_tracing, noise_frame};
use flipbook_core::{ImageInfo, PixelBuffer, TimeRange};
use flipbook_disk::{DiskCache, DiskCacheConfig};
use std::sync::Arc;

fn cache_in(dir: &std::path::Path, max_disk_size: u64) -> DiskCache {
    DiskCache::new(DiskCacheConfig::new(dir).with_max_disk_size(max_disk_size))
}

#[test]
fn closed_sequence_is_evicted_when_the_disk_budget_is_exceeded() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let cache = cache_in(tmp.path(), 1_800_000);

    // 600x500 RGBA is 1,200,000 bytes, 450x500 is 900,000.
    let a = cache
        .open_sequence("A", ImageInfo::rgba(600, 500), 1, 30.0, &[])
        .unwrap();
    a.write_frame(0, &noise_frame(600, 500, 1)).unwrap();
    let a_path = a.path().to_path_buf();
    assert!(a.file_size() > 1_200_000);
    drop(a);

    let b = cache
        .open_sequence("B", ImageInfo::rgba(450, 500), 1, 30.0, &[])
        .unwrap();
    b.write_frame(0, &noise_frame(450, 500, 2)).unwrap();

    assert!(!cache.contains("A"));
    assert!(!a_path.exists());
    assert!(b.path().exists());
    assert_eq!(cache.total_disk_size(), b.file_size());
    assert!(cache.total_disk_size() > 900_000 && cache.total_disk_size() < 1_000_000);
}

#[test]
fn incompatible_reopen_creates_a_new_file() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let cache = cache_in(tmp.path(), 1 << 30);

    let first = cache
        .open_sequence("k", ImageInfo::rgba(16, 16), 30, 24.0, &[])
        .unwrap();
    let second = cache
        .open_sequence("k", ImageInfo::rgba(32, 16), 30, 24.0, &[])
        .unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.file_id(), second.file_id());
    assert_ne!(first.path(), second.path());
    assert_eq!(cache.file_path("k").as_deref(), Some(second.path()));

    let old_path = first.path().to_path_buf();
    assert!(old_path.exists());
    drop(first);
    assert!(!old_path.exists());
    assert!(second.path().exists());
}

#[test]
fn cached_frames_survive_a_restart() {
    init_tracing();
    let tmp = tempfile::tempdir().unwrap();
    let info = ImageInfo::rgba(64, 32);
    let ranges = [TimeRange::new(2, 5)];
    let frames: Vec<_> = (0..8).map(|i| PixelBuffer::test_pattern(64, 32, i)).collect();

    {
        let cache = cache_in(tmp.path(), 1 << 30);
        let seq = cache.open_sequence("clip", info, 8, 25.0, &ranges).unwrap();
        for index in [0u32, 1, 2, 6, 7] {
            seq.write_frame(index, &frames[index as usize]).unwrap();
        }
        cache.write_file("thumbnail", b"png bytes").unwrap();
    }

    let cache = cache_in(tmp.path(), 1 << 30);
    assert_eq!(cache.read_file("thumbnail").as_deref(), Some(&b"png bytes"[..]));
    let seq = cache.open_sequence("clip", info, 8, 25.0, &ranges).unwrap();
    assert_eq!(seq.cached_frame_count(), 8);
    assert!(seq.is_complete());

    let mut output = PixelBuffer::new(info);
    for index in 0..8u32 {
        seq.read_frame(index, &mut output).unwrap();
        let expected = if (2..=5).contains(&index) { 2 } else { index };
        assert_eq!(output, frames[expected as usize], "frame {index}");
    }
    assert_eq!(cache.stats().entries, 2);
}

#[test]
fn total_size_tracks_every_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = cache_in(tmp.path(), 1 << 30);
    let info = ImageInfo::rgba(32, 32);
    let seq = cache.open_sequence("seq", info, 2, 30.0, &[]).unwrap();
    seq.write_frame(0, &noise_frame(32, 32, 9)).unwrap();
    cache.write_file("blob", &[7u8; 1000]).unwrap();

    let on_disk: u64 = [cache.file_path("seq"), cache.file_path("blob")]
        .into_iter()
        .flatten()
        .map(|path| std::fs::metadata(path).unwrap().len())
        .sum();
    assert_eq!(cache.total_disk_size(), on_disk);

    cache.remove_all();
    assert_eq!(cache.total_disk_size(), 0);
}
