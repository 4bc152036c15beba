//! Process-wide, size-bounded LRU registry of sequence files and blobs.
//!
//! # Directory layout
//!
//! ```text
//! <cache_dir>/cache.cfg       key index
//! <cache_dir>/files/<id>.bin  one data file per entry
//! ```
//!
//! The key index is a sequence of `{file_id:u32, key_len:u32, key}` records
//! (little-endian) written from the LRU tail toward the head, so replaying it
//! and inserting each record at the front rebuilds the recency order.
//!
//! # Ordering
//!
//! The LRU list runs from the most protected entry (front) to the next
//! eviction candidate (back). Open sequence files always sit in front of
//! closed entries, so eviction walks from the back and stops at the first
//! open entry.

use crate::config::DiskCacheConfig;
use crate::sequence_file::{CacheLink, SequenceFile};
use flipbook_core::{FlipbookError, ImageInfo, Result, TimeRange};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, info, warn};

const INDEX_RECORD_HEAD: usize = 8;

/// Registry record of one on-disk data file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FileInfo {
    key: String,
    file_id: u32,
    file_size: u64,
}

/// Snapshot of the cache bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskCacheStats {
    /// Registered entries, sequences and blobs alike.
    pub entries: usize,
    /// Sequence files currently held open by a caller.
    pub open_files: usize,
    pub total_disk_size: u64,
    pub max_disk_size: u64,
}

/// Shared state; sequence files hold a weak reference to it.
pub(crate) struct CacheShared {
    state: Mutex<CacheState>,
}

struct CacheState {
    /// `None` if the cache directory could not be created.
    files_dir: Option<PathBuf>,
    index_path: PathBuf,
    max_disk_size: u64,
    total_disk_size: u64,
    file_id_count: u32,
    key_to_id: HashMap<String, u32>,
    entries: HashMap<u32, FileInfo>,
    lru: VecDeque<u32>,
    open_files: HashMap<u32, Weak<SequenceFile>>,
}

/// Persistent cache of compressed frame sequences and opaque blobs.
///
/// All operations serialize through one lock, so a `DiskCache` can be shared
/// freely between threads. Tests construct their own instance over a temporary
/// directory; the renderer uses [`DiskCache::global`].
#[derive(Clone)]
pub struct DiskCache {
    shared: Arc<CacheShared>,
}

impl DiskCache {
    /// Open the cache rooted at `config.cache_dir`, loading its key index.
    ///
    /// If the directory cannot be created the cache stays usable but declines
    /// every write.
    pub fn new(config: DiskCacheConfig) -> Self {
        let files_dir = config.files_dir();
        let files_dir = match fs::create_dir_all(&files_dir) {
            Ok(()) => Some(files_dir),
            Err(e) => {
                warn!(dir = %files_dir.display(), error = %e, "Disk cache disabled");
                None
            }
        };
        let mut state = CacheState {
            files_dir,
            index_path: config.index_path(),
            max_disk_size: config.max_disk_size,
            total_disk_size: 0,
            file_id_count: 1,
            key_to_id: HashMap::new(),
            entries: HashMap::new(),
            lru: VecDeque::new(),
            open_files: HashMap::new(),
        };
        if state.files_dir.is_some() {
            state.read_index();
        }
        info!(
            dir = %config.cache_dir.display(),
            entries = state.entries.len(),
            total = state.total_disk_size,
            "Disk cache ready"
        );
        Self {
            shared: Arc::new(CacheShared {
                state: Mutex::new(state),
            }),
        }
    }

    /// Process-wide cache in the default location, created on first use.
    pub fn global() -> &'static DiskCache {
        static GLOBAL: OnceLock<DiskCache> = OnceLock::new();
        GLOBAL.get_or_init(|| DiskCache::new(DiskCacheConfig::default()))
    }

    /// Open the sequence file for `key`, creating it if needed.
    ///
    /// An empty key yields a throwaway file that is not size-accounted and is
    /// deleted when its last reference drops. If the key is already open with
    /// the same parameters the live instance is returned; if it is open with
    /// different parameters the old file is detached and a fresh one created.
    pub fn open_sequence(
        &self,
        key: &str,
        info: ImageInfo,
        frame_count: u32,
        frame_rate: f32,
        static_ranges: &[TimeRange],
    ) -> Result<Arc<SequenceFile>> {
        let mut retired = None;
        let result = self.shared.state.lock().open_sequence(
            &self.shared,
            key,
            info,
            frame_count,
            frame_rate,
            static_ranges,
            &mut retired,
        );
        // A detached file may close here; that re-enters the cache lock.
        drop(retired);
        result
    }

    /// Read the blob stored under `key`.
    pub fn read_file(&self, key: &str) -> Option<Vec<u8>> {
        self.shared.state.lock().read_file(key)
    }

    /// Store `data` under `key`, replacing any previous blob.
    ///
    /// Fails without touching the cache if the blob cannot fit even after
    /// evicting every closed entry.
    pub fn write_file(&self, key: &str, data: &[u8]) -> Result<()> {
        self.shared.state.lock().write_file(key, data)
    }

    /// Change the disk budget, evicting closed entries down to it.
    pub fn set_max_disk_size(&self, max_disk_size: u64) {
        let mut state = self.shared.state.lock();
        if state.max_disk_size == max_disk_size {
            return;
        }
        state.max_disk_size = max_disk_size;
        if state.check_disk_space(max_disk_size) {
            state.save_index();
        }
    }

    pub fn max_disk_size(&self) -> u64 {
        self.shared.state.lock().max_disk_size
    }

    pub fn total_disk_size(&self) -> u64 {
        self.shared.state.lock().total_disk_size
    }

    /// Delete every closed entry. Open files are detached and deleted on close.
    pub fn remove_all(&self) {
        self.shared.state.lock().remove_all();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.shared.state.lock().key_to_id.contains_key(key)
    }

    /// Path of the data file backing `key`, if registered.
    pub fn file_path(&self, key: &str) -> Option<PathBuf> {
        let state = self.shared.state.lock();
        let id = *state.key_to_id.get(key)?;
        state.data_path(id)
    }

    pub fn stats(&self) -> DiskCacheStats {
        let state = self.shared.state.lock();
        DiskCacheStats {
            entries: state.entries.len(),
            open_files: state.open_files.values().filter(|w| w.strong_count() > 0).count(),
            total_disk_size: state.total_disk_size,
            max_disk_size: state.max_disk_size,
        }
    }
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DiskCache").field(&self.stats()).finish()
    }
}

impl CacheShared {
    /// Called once the last strong reference to a sequence file is gone.
    pub(crate) fn notify_closed(&self, file_id: u32) {
        let mut state = self.state.lock();
        if state.is_open(file_id) {
            // Reopened in the meantime.
            return;
        }
        state.open_files.remove(&file_id);
        if !state.entries.contains_key(&file_id) {
            state.delete_data_file(file_id);
            return;
        }
        state.lru.retain(|&id| id != file_id);
        state.insert_behind_open(file_id);
        let max = state.max_disk_size;
        if state.check_disk_space(max) {
            state.save_index();
        }
    }

    pub(crate) fn notify_size_changed(&self, file_id: u32, file_size: u64) {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.get_mut(&file_id) else {
            return;
        };
        let old_size = std::mem::replace(&mut entry.file_size, file_size);
        state.total_disk_size = state.total_disk_size - old_size + file_size;
        let max = state.max_disk_size;
        if state.check_disk_space(max) {
            state.save_index();
        }
    }
}

impl CacheState {
    fn data_path(&self, file_id: u32) -> Option<PathBuf> {
        self.files_dir
            .as_ref()
            .map(|dir| dir.join(format!("{file_id}.bin")))
    }

    fn require_dir(&self) -> Result<()> {
        if self.files_dir.is_none() {
            return Err(FlipbookError::Internal("disk cache is unavailable".into()));
        }
        Ok(())
    }

    fn next_file_id(&mut self) -> u32 {
        let id = self.file_id_count;
        self.file_id_count += 1;
        id
    }

    fn is_open(&self, file_id: u32) -> bool {
        self.open_files
            .get(&file_id)
            .is_some_and(|file| file.strong_count() > 0)
    }

    fn move_to_front(&mut self, file_id: u32) {
        self.lru.retain(|&id| id != file_id);
        self.lru.push_front(file_id);
    }

    /// Insert at the head of the closed section, behind every open entry.
    fn insert_behind_open(&mut self, file_id: u32) {
        let position = self.lru.iter().position(|&id| !self.is_open(id));
        match position {
            Some(index) => self.lru.insert(index, file_id),
            None => self.lru.push_back(file_id),
        }
    }

    fn register(&mut self, entry: FileInfo) {
        self.total_disk_size += entry.file_size;
        self.key_to_id.insert(entry.key.clone(), entry.file_id);
        self.entries.insert(entry.file_id, entry);
    }

    /// Drop an entry from the registry without touching its data file.
    fn unregister(&mut self, file_id: u32) -> Option<FileInfo> {
        let entry = self.entries.remove(&file_id)?;
        self.lru.retain(|&id| id != file_id);
        if self.key_to_id.get(&entry.key) == Some(&file_id) {
            self.key_to_id.remove(&entry.key);
        }
        self.total_disk_size -= entry.file_size;
        Some(entry)
    }

    fn delete_data_file(&self, file_id: u32) {
        let Some(path) = self.data_path(file_id) else {
            return;
        };
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Deleted cache file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete cache file"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn open_sequence(
        &mut self,
        shared: &Arc<CacheShared>,
        key: &str,
        info: ImageInfo,
        frame_count: u32,
        frame_rate: f32,
        static_ranges: &[TimeRange],
        retired: &mut Option<Arc<SequenceFile>>,
    ) -> Result<Arc<SequenceFile>> {
        self.require_dir()?;
        if key.is_empty() {
            let file_id = self.next_file_id();
            return self.open_data_file(shared, file_id, info, frame_count, frame_rate, static_ranges);
        }

        let mut existing_id = self.key_to_id.get(key).copied();
        if let Some(file_id) = existing_id {
            if let Some(live) = self.open_files.get(&file_id).and_then(Weak::upgrade) {
                if live.is_compatible(&info, frame_count, frame_rate, static_ranges) {
                    self.move_to_front(file_id);
                    return Ok(live);
                }
                info!(key, file_id, "Sequence changed shape, detaching old file");
                self.unregister(file_id);
                self.save_index();
                *retired = Some(live);
                existing_id = None;
            }
        }

        let file_id = match existing_id {
            Some(id) => id,
            None => self.next_file_id(),
        };
        let file = self.open_data_file(shared, file_id, info, frame_count, frame_rate, static_ranges)?;
        let file_size = file.file_size();
        let mut changed = false;
        match self.entries.get_mut(&file_id) {
            Some(entry) => {
                let old_size = std::mem::replace(&mut entry.file_size, file_size);
                self.total_disk_size = self.total_disk_size - old_size + file_size;
            }
            None => {
                self.register(FileInfo {
                    key: key.to_string(),
                    file_id,
                    file_size,
                });
                changed = true;
            }
        }
        self.move_to_front(file_id);
        let max = self.max_disk_size;
        if self.check_disk_space(max) || changed {
            self.save_index();
        }
        Ok(file)
    }

    fn open_data_file(
        &mut self,
        shared: &Arc<CacheShared>,
        file_id: u32,
        info: ImageInfo,
        frame_count: u32,
        frame_rate: f32,
        static_ranges: &[TimeRange],
    ) -> Result<Arc<SequenceFile>> {
        let path = self
            .data_path(file_id)
            .ok_or_else(|| FlipbookError::Internal("disk cache is unavailable".into()))?;
        let link = CacheLink {
            cache: Arc::downgrade(shared),
            file_id,
        };
        let file = SequenceFile::open_linked(
            &path,
            info,
            frame_count,
            frame_rate,
            static_ranges,
            Some(link),
        )?;
        self.open_files.insert(file_id, Arc::downgrade(&file));
        debug!(file_id, path = %path.display(), "Opened sequence file");
        Ok(file)
    }

    fn read_file(&mut self, key: &str) -> Option<Vec<u8>> {
        let file_id = *self.key_to_id.get(key)?;
        let path = self.data_path(file_id)?;
        match fs::read(&path) {
            Ok(data) => {
                if !self.is_open(file_id) {
                    self.lru.retain(|&id| id != file_id);
                    self.insert_behind_open(file_id);
                }
                if let Some(entry) = self.entries.get_mut(&file_id) {
                    let old_size = std::mem::replace(&mut entry.file_size, data.len() as u64);
                    self.total_disk_size = self.total_disk_size - old_size + data.len() as u64;
                }
                Some(data)
            }
            Err(e) => {
                warn!(key, error = %e, "Dropping unreadable cache entry");
                self.unregister(file_id);
                self.save_index();
                None
            }
        }
    }

    fn write_file(&mut self, key: &str, data: &[u8]) -> Result<()> {
        self.require_dir()?;
        if key.is_empty() {
            return Err(FlipbookError::InvalidParameter("empty cache key".into()));
        }
        let existing_id = self.key_to_id.get(key).copied();
        if let Some(file_id) = existing_id {
            if self.is_open(file_id) {
                return Err(FlipbookError::FileBusy(key.to_string()));
            }
        }

        let new_size = data.len() as u64;
        let replaced = existing_id
            .and_then(|id| self.entries.get(&id))
            .map_or(0, |entry| entry.file_size);
        let evictable: u64 = self
            .entries
            .values()
            .filter(|entry| Some(entry.file_id) != existing_id && !self.is_open(entry.file_id))
            .map(|entry| entry.file_size)
            .sum();
        let floor = self.total_disk_size - replaced - evictable + new_size;
        if floor > self.max_disk_size {
            debug!(key, size = new_size, "Blob does not fit in the disk budget");
            return Err(FlipbookError::QuotaExceeded {
                requested: new_size,
                limit: self.max_disk_size,
            });
        }

        let file_id = match existing_id {
            Some(id) => id,
            None => self.next_file_id(),
        };
        let path = self
            .data_path(file_id)
            .ok_or_else(|| FlipbookError::Internal("disk cache is unavailable".into()))?;
        if let Err(e) = fs::write(&path, data) {
            if existing_id.is_some() {
                self.unregister(file_id);
                self.save_index();
            }
            self.delete_data_file(file_id);
            return Err(e.into());
        }

        if existing_id.is_some() {
            self.unregister(file_id);
        }
        self.register(FileInfo {
            key: key.to_string(),
            file_id,
            file_size: new_size,
        });
        self.insert_behind_open(file_id);
        let max = self.max_disk_size;
        self.check_disk_space(max);
        self.save_index();
        Ok(())
    }

    /// Evict closed entries from the tail until the total fits `limit`.
    ///
    /// Returns true if anything was evicted.
    fn check_disk_space(&mut self, limit: u64) -> bool {
        let mut evicted = false;
        while self.total_disk_size > limit {
            let Some(&file_id) = self.lru.back() else {
                break;
            };
            if self.is_open(file_id) {
                break;
            }
            if let Some(entry) = self.unregister(file_id) {
                debug!(key = %entry.key, size = entry.file_size, "Evicted cache entry");
            } else {
                self.lru.pop_back();
            }
            self.delete_data_file(file_id);
            evicted = true;
        }
        evicted
    }

    fn remove_all(&mut self) {
        let ids: Vec<u32> = self.entries.keys().copied().collect();
        for file_id in ids {
            self.unregister(file_id);
            if !self.is_open(file_id) {
                self.delete_data_file(file_id);
            }
        }
        self.total_disk_size = 0;
        info!("Disk cache cleared");
        self.save_index();
    }

    fn save_index(&self) {
        let mut buffer = Vec::new();
        for file_id in self.lru.iter().rev() {
            let Some(entry) = self.entries.get(file_id) else {
                continue;
            };
            buffer.extend_from_slice(&entry.file_id.to_le_bytes());
            buffer.extend_from_slice(&(entry.key.len() as u32).to_le_bytes());
            buffer.extend_from_slice(entry.key.as_bytes());
        }
        let staging = self.index_path.with_extension("cfg.tmp");
        let written = fs::write(&staging, &buffer).and_then(|()| fs::rename(&staging, &self.index_path));
        if let Err(e) = written {
            warn!(path = %self.index_path.display(), error = %e, "Failed to save cache index");
        }
    }

    fn read_index(&mut self) {
        let data = match fs::read(&self.index_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %self.index_path.display(), error = %e, "Failed to read cache index");
                Vec::new()
            }
        };

        let mut position = 0;
        while position + INDEX_RECORD_HEAD <= data.len() {
            let file_id = u32::from_le_bytes([
                data[position],
                data[position + 1],
                data[position + 2],
                data[position + 3],
            ]);
            let key_len = u32::from_le_bytes([
                data[position + 4],
                data[position + 5],
                data[position + 6],
                data[position + 7],
            ]) as usize;
            position += INDEX_RECORD_HEAD;
            if key_len > data.len() - position {
                break;
            }
            let key = String::from_utf8_lossy(&data[position..position + key_len]).into_owned();
            position += key_len;
            self.file_id_count = self.file_id_count.max(file_id.saturating_add(1));
            if key.is_empty() || self.entries.contains_key(&file_id) {
                continue;
            }
            if let Some(stale) = self.key_to_id.get(&key).copied() {
                self.unregister(stale);
            }
            self.register(FileInfo {
                key,
                file_id,
                file_size: 0,
            });
            self.lru.push_front(file_id);
        }

        self.scan_files();

        let missing: Vec<u32> = self
            .entries
            .values()
            .filter(|entry| entry.file_size == 0)
            .map(|entry| entry.file_id)
            .collect();
        for file_id in &missing {
            self.unregister(*file_id);
            self.delete_data_file(*file_id);
        }
        let max = self.max_disk_size;
        if self.check_disk_space(max) || !missing.is_empty() {
            self.save_index();
        }
    }

    /// Attach on-disk sizes to index records and delete orphaned files.
    fn scan_files(&mut self) {
        let Some(dir) = self.files_dir.clone() else {
            return;
        };
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list cache files");
                return;
            }
        };
        for item in listing.flatten() {
            let path = item.path();
            let file_id = path
                .extension()
                .filter(|ext| *ext == "bin")
                .and_then(|_| path.file_stem())
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok());
            let size = item.metadata().map(|m| m.len()).unwrap_or(0);
            match file_id.and_then(|id| self.entries.get_mut(&id)) {
                Some(entry) => {
                    entry.file_size = size;
                    self.total_disk_size += size;
                }
                None => {
                    debug!(path = %path.display(), "Deleting orphaned cache file");
                    if let Err(e) = fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "Failed to delete orphaned file");
                    }
                }
            }
        }
    }
}
