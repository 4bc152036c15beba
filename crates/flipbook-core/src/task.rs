//! Background task pool with fire-and-join handles.
//!
//! Decode work (frame decompression, bitmap and video decoding) runs on a
//! small fixed-size pool. Each spawned job hands its result back through a
//! one-slot channel, so the render thread can join it, poll it, or simply drop
//! the handle to discard a stale result.

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Upper bound on decode threads; decoding is memory-bound, more threads don't help.
const MAX_DECODE_THREADS: usize = 4;

/// Fixed-size pool for background decode work.
pub struct TaskPool {
    /// `None` runs every job inline on the calling thread.
    pool: Option<rayon::ThreadPool>,
}

impl TaskPool {
    /// Create a pool with `threads` worker threads.
    pub fn new(threads: usize) -> crate::Result<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("flipbook-decode-{index}"))
            .panic_handler(|_| warn!("Background decode job panicked"))
            .build()
            .map_err(|e| crate::FlipbookError::Internal(format!("thread pool: {e}")))?;
        debug!(threads, "Task pool created");
        Ok(Self { pool: Some(pool) })
    }

    /// A pool that runs every job synchronously at spawn time.
    pub fn inline() -> Self {
        Self { pool: None }
    }

    /// Process-wide pool, sized from the CPU count on first use.
    pub fn global() -> Arc<TaskPool> {
        static GLOBAL: OnceLock<Arc<TaskPool>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| {
                let threads = (num_cpus::get() / 2).clamp(1, MAX_DECODE_THREADS);
                match TaskPool::new(threads) {
                    Ok(pool) => Arc::new(pool),
                    Err(e) => {
                        warn!(error = %e, "Falling back to inline decoding");
                        Arc::new(TaskPool::inline())
                    }
                }
            })
            .clone()
    }

    pub fn is_inline(&self) -> bool {
        self.pool.is_none()
    }

    /// Run `job` in the background and return a handle to its result.
    pub fn spawn<T, F>(&self, job: F) -> Task<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let run = move || {
            // The receiver may be gone already; a discarded result is fine.
            let _ = tx.send(job());
        };
        match &self.pool {
            Some(pool) => pool.spawn(run),
            None => run(),
        }
        Task { rx, ready: None }
    }
}

/// Handle to a job running on a [`TaskPool`].
///
/// Dropping the handle discards the result; the job itself is never
/// interrupted.
pub struct Task<T> {
    rx: Receiver<T>,
    ready: Option<T>,
}

impl<T> Task<T> {
    /// True once the job has produced its result (or died).
    pub fn is_finished(&mut self) -> bool {
        if self.ready.is_some() {
            return true;
        }
        match self.rx.try_recv() {
            Ok(value) => {
                self.ready = Some(value);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => true,
        }
    }

    /// Take the result if it is available, without blocking.
    pub fn try_take(&mut self) -> Option<T> {
        if self.is_finished() {
            self.ready.take()
        } else {
            None
        }
    }

    /// Block until the job finishes. `None` if the job panicked.
    pub fn wait(mut self) -> Option<T> {
        if let Some(value) = self.ready.take() {
            return Some(value);
        }
        self.rx.recv().ok()
    }
}
