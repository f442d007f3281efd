//! Dispatch counters for reporting

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters shared by every pipeline of a dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    invocations: AtomicU64,
    failed_invocations: AtomicU64,
    markers_written: AtomicU64,
    batches_forwarded: AtomicU64,
    events_forwarded: AtomicU64,
    offsets_committed: AtomicU64,
    stream_failures: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_invocation(&self, success: bool) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_invocations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_markers_written(&self, count: usize) {
        self.markers_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_batch(&self, events: usize) {
        self.batches_forwarded.fetch_add(1, Ordering::Relaxed);
        self.events_forwarded
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn inc_offsets_committed(&self) {
        self.offsets_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stream_failures(&self) {
        self.stream_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            failed_invocations: self.failed_invocations.load(Ordering::Relaxed),
            markers_written: self.markers_written.load(Ordering::Relaxed),
            batches_forwarded: self.batches_forwarded.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            offsets_committed: self.offsets_committed.load(Ordering::Relaxed),
            stream_failures: self.stream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub invocations: u64,
    pub failed_invocations: u64,
    pub markers_written: u64,
    pub batches_forwarded: u64,
    pub events_forwarded: u64,
    pub offsets_committed: u64,
    pub stream_failures: u64,
}
