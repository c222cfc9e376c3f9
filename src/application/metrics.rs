//! Counters describing what the pipeline did with each record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pipeline counters.
///
/// Clones share the same counters. All updates are relaxed atomics; values
/// read while logging is in progress are approximate.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Records written to the sinks on the calling thread
    emitted: AtomicU64,
    /// Records held back as a key's pending message
    buffered: AtomicU64,
    /// Pending records written later by a ticker
    flushed: AtomicU64,
    /// Records discarded by `[L:off]` or the minimum level
    dropped: AtomicU64,
    /// Records handed to the async queue
    async_enqueued: AtomicU64,
    /// Records lost because the async queue was full
    async_missed: AtomicU64,
    /// Sink writes that failed
    write_errors: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_emitted(&self) {
        self.inner.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_buffered(&self) {
        self.inner.buffered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flushed(&self) {
        self.inner.flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_async_enqueued(&self) {
        self.inner.async_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_async_missed(&self) {
        self.inner.async_missed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write_error(&self) {
        self.inner.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn emitted(&self) -> u64 {
        self.inner.emitted.load(Ordering::Relaxed)
    }

    pub fn buffered(&self) -> u64 {
        self.inner.buffered.load(Ordering::Relaxed)
    }

    pub fn flushed(&self) -> u64 {
        self.inner.flushed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn async_enqueued(&self) -> u64 {
        self.inner.async_enqueued.load(Ordering::Relaxed)
    }

    pub fn async_missed(&self) -> u64 {
        self.inner.async_missed.load(Ordering::Relaxed)
    }

    pub fn write_errors(&self) -> u64 {
        self.inner.write_errors.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            emitted: self.emitted(),
            buffered: self.buffered(),
            flushed: self.flushed(),
            dropped: self.dropped(),
            async_enqueued: self.async_enqueued(),
            async_missed: self.async_missed(),
            write_errors: self.write_errors(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        for counter in [
            &self.inner.emitted,
            &self.inner.buffered,
            &self.inner.flushed,
            &self.inner.dropped,
            &self.inner.async_enqueued,
            &self.inner.async_missed,
            &self.inner.write_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub emitted: u64,
    pub buffered: u64,
    pub flushed: u64,
    pub dropped: u64,
    pub async_enqueued: u64,
    pub async_missed: u64,
    pub write_errors: u64,
}

impl MetricsSnapshot {
    /// Share of rate limited records that were held back (0.0 to 1.0).
    ///
    /// Returns 0.0 if nothing has been processed.
    pub fn suppression_rate(&self) -> f64 {
        let total = self.emitted.saturating_add(self.buffered);
        if total == 0 {
            0.0
        } else {
            self.buffered as f64 / total as f64
        }
    }
}
