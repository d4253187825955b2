//! Per-operation performance accounting.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct MetricsInner {
    operations: u64,
    errors: u64,
    total_duration: Duration,
    average_duration: Duration,
    memory_delta: i64,
    last_operation: String,
}

/// Accumulates per-operation duration, memory delta and error counts. One
/// collector per client; metrics recording runs concurrently with progress
/// monitoring, so every update happens under a single lock.
pub struct Metrics {
    started: Instant,
    inner: Mutex<MetricsInner>,
}

/// Consistent point-in-time copy of the counters, safe to read after the
/// call returns and independent of further recording.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub operations: u64,
    pub errors: u64,
    pub total_duration: Duration,
    /// `None` until the first operation completes; the average is undefined
    /// at zero operations.
    pub average_duration: Option<Duration>,
    pub memory_delta: i64,
    pub last_operation: String,
    pub uptime: Duration,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            started: Instant::now(),
            inner: Mutex::new(MetricsInner::default()),
        }
    }

    /// Fold one completed operation into the counters. The whole update is
    /// one critical section so a concurrent snapshot never observes a
    /// partially recomputed average.
    pub fn record(&self, operation: &str, duration: Duration, memory_delta: i64, failed: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations += 1;
        if failed {
            inner.errors += 1;
        }
        inner.total_duration += duration;
        inner.average_duration = inner.total_duration / inner.operations as u32;
        inner.memory_delta += memory_delta;
        inner.last_operation = operation.to_string();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().unwrap();
        MetricsSnapshot {
            operations: inner.operations,
            errors: inner.errors,
            total_duration: inner.total_duration,
            average_duration: (inner.operations > 0).then_some(inner.average_duration),
            memory_delta: inner.memory_delta,
            last_operation: inner.last_operation.clone(),
            uptime: self.started.elapsed(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
