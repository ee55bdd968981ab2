//! 📊 Pipeline counters: "how much did we lose?" answered with numbers instead of vibes.
//!
//! Every counter is a relaxed atomic. Nobody reads these to make a decision inside the
//! pipeline, they're for humans and tests. Relaxed is fine. Relaxed is a lifestyle.

use std::sync::atomic::{AtomicU64, Ordering};

/// 📊 Shared counters, one instance per supervisor, handed around in an `Arc`.
#[derive(Debug, Default)]
pub struct PipelineStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    write_failures: AtomicU64,
    connect_failures: AtomicU64,
    reconnects: AtomicU64,
}

impl PipelineStats {
    pub const fn new() -> Self {
        Self {
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// 📸 Point-in-time copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// 📸 What the counters said at the moment somebody asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// ✅ accepted into the queue
    pub enqueued: u64,
    /// 🗑️ discarded because the queue was full (or already closed for shutdown)
    pub dropped: u64,
    /// 📥 landed in the sink
    pub written: u64,
    /// 💀 rows the sink refused, or the one in flight when the connection died
    pub write_failures: u64,
    /// 🔌 failed open/verify attempts
    pub connect_failures: u64,
    /// 🔄 times a live connection was torn down and the worker went back to connecting
    pub reconnects: u64,
}

impl StatsSnapshot {
    /// 📦 Accepted but not yet accounted for: still queued, or in the worker's hands.
    pub fn in_flight(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.written)
            .saturating_sub(self.write_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_counters_start_at_zero_like_all_of_us() {
        assert_eq!(PipelineStats::new().snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn the_one_where_in_flight_is_what_is_left_over() {
        let stats = PipelineStats::new();
        for _ in 0..5 {
            stats.record_enqueued();
        }
        stats.record_written();
        stats.record_written();
        stats.record_write_failure();
        stats.record_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.enqueued, 5);
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.in_flight(), 2);
    }
}
