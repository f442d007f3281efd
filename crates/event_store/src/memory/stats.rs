//! Request counters for the in-memory stores

use std::sync::atomic::{AtomicU64, Ordering};

/// Event log request counters
#[derive(Debug, Default)]
pub struct LogStats {
    queries: AtomicU64,
    marker_requests: AtomicU64,
    appends: AtomicU64,
}

impl LogStats {
    pub fn inc_queries(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_marker_requests(&self) {
        self.marker_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_appends(&self) {
        self.appends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LogStatsSnapshot {
        LogStatsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            marker_requests: self.marker_requests.load(Ordering::Relaxed),
            appends: self.appends.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of event log counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogStatsSnapshot {
    pub queries: u64,
    pub marker_requests: u64,
    pub appends: u64,
}

/// Offset store request counters
#[derive(Debug, Default)]
pub struct OffsetStats {
    batch_gets: AtomicU64,
    puts: AtomicU64,
    conflicts: AtomicU64,
}

impl OffsetStats {
    pub fn inc_batch_gets(&self) {
        self.batch_gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_puts(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OffsetStatsSnapshot {
        OffsetStatsSnapshot {
            batch_gets: self.batch_gets.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of offset store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetStatsSnapshot {
    pub batch_gets: u64,
    /// Successful and rejected writes
    pub puts: u64,
    pub conflicts: u64,
}
