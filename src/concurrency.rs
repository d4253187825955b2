//! Adaptive concurrency control for downloads.
//!
//! The admission semaphore bounds how many logical download slots are
//! considered available; the actual transfer parallelism lives in the
//! external tool, so this is a rate governor, not an OS-thread limiter.
//! Resizing swaps in a freshly sized semaphore behind an indirection cell:
//! in-flight holders of the old one keep functioning until they finish,
//! while new acquisitions go through the current handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

const LARGE_FILE_BYTES: u64 = 100 * 1024 * 1024;
const SMALL_FILE_BYTES: u64 = 10 * 1024 * 1024;
const FAST_MBPS: f64 = 50.0;
const SLOW_MBPS: f64 = 5.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Lower bound on the concurrency level, regardless of observed throughput.
pub const MIN_CONCURRENCY: usize = 2;

struct Admission {
    level: usize,
    semaphore: Arc<Semaphore>,
}

/// Point-in-time download counters.
#[derive(Debug, Clone, Copy)]
pub struct DownloadStats {
    pub active: u64,
    pub completed: u64,
    /// Average throughput in MB/s since the controller was created.
    pub average_mbps: f64,
    pub concurrency: usize,
}

/// Maintains a download concurrency level that reacts to observed file size
/// and throughput, bounded by hardware parallelism. One instance per client;
/// all mutation goes through its own synchronization.
pub struct AdaptiveConcurrency {
    cores: usize,
    admission: RwLock<Admission>,
    active: AtomicU64,
    completed: AtomicU64,
    total_bytes: AtomicU64,
    started: Instant,
}

impl AdaptiveConcurrency {
    pub fn new(initial: usize) -> Self {
        Self::with_core_count(initial, num_cpus::get())
    }

    /// Core count is injected so tests can pin the hardware ceiling.
    pub fn with_core_count(initial: usize, cores: usize) -> Self {
        let cores = cores.max(1);
        let level = initial.clamp(MIN_CONCURRENCY, cores * 8);
        AdaptiveConcurrency {
            cores,
            admission: RwLock::new(Admission {
                level,
                semaphore: Arc::new(Semaphore::new(level)),
            }),
            active: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn current(&self) -> usize {
        self.admission.read().unwrap().level
    }

    /// Set the level directly (clamped to the valid range), swapping the
    /// admission semaphore if it changes. Used when the operator passes an
    /// explicit `--count`.
    pub fn set_level(&self, level: usize) {
        let mut admission = self.admission.write().unwrap();
        let level = level.clamp(MIN_CONCURRENCY, self.cores * 8);
        if level != admission.level {
            debug!(from = admission.level, to = level, "setting concurrency level");
            admission.level = level;
            admission.semaphore = Arc::new(Semaphore::new(level));
        }
    }

    /// Acquire one logical download slot from the current semaphore handle.
    pub async fn acquire(self: Arc<Self>) -> DownloadSlot {
        let semaphore = self.admission.read().unwrap().semaphore.clone();
        let permit = semaphore
            .acquire_owned()
            .await
            .expect("admission semaphore never closed");
        self.active.fetch_add(1, Ordering::Relaxed);
        DownloadSlot {
            controller: self,
            _permit: permit,
        }
    }

    /// Recompute the target level after a completed download.
    ///
    /// Ordered policy: large files raise the floor to 5; small files cap at
    /// 10; throughput above 50 MB/s doubles the level (at most 4x cores);
    /// below 5 MB/s halves it (at least the minimum); the result is clamped
    /// to `[MIN_CONCURRENCY, 8 x cores]`.
    pub fn adjust(&self, file_size: u64, elapsed: Duration) {
        let mut admission = self.admission.write().unwrap();
        let mut level = admission.level;

        if file_size > LARGE_FILE_BYTES {
            level = level.max(5);
        } else if file_size < SMALL_FILE_BYTES {
            level = level.min(10);
        }

        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            let mbps = file_size as f64 / secs / MIB;
            if mbps > FAST_MBPS {
                level = (level * 2).min(self.cores * 4);
            } else if mbps < SLOW_MBPS {
                level = (level / 2).max(MIN_CONCURRENCY);
            }
        }

        level = level.clamp(MIN_CONCURRENCY, self.cores * 8);

        if level != admission.level {
            debug!(
                from = admission.level,
                to = level,
                file_size,
                elapsed_secs = secs,
                "adjusted concurrency level"
            );
            admission.level = level;
            admission.semaphore = Arc::new(Semaphore::new(level));
        }
    }

    pub fn stats(&self) -> DownloadStats {
        let elapsed = self.started.elapsed().as_secs_f64();
        let total_bytes = self.total_bytes.load(Ordering::Relaxed);
        let average_mbps = if elapsed > 0.0 && total_bytes > 0 {
            total_bytes as f64 / elapsed / MIB
        } else {
            0.0
        };
        DownloadStats {
            active: self.active.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            average_mbps,
            concurrency: self.current(),
        }
    }
}

/// One held logical download slot. Dropping it releases the slot; calling
/// [`DownloadSlot::complete`] first also folds the transfer into the
/// completed/byte counters.
pub struct DownloadSlot {
    controller: Arc<AdaptiveConcurrency>,
    _permit: OwnedSemaphorePermit,
}

impl DownloadSlot {
    pub fn complete(self, bytes: u64) {
        self.controller.completed.fetch_add(1, Ordering::Relaxed);
        self.controller.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

impl Drop for DownloadSlot {
    fn drop(&mut self) {
        self.controller.active.fetch_sub(1, Ordering::Relaxed);
    }
}
