//! Per-cycle frame accounting.

use crate::capture::BufferPool;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of a cycle's frame accounting.
///
/// Every acquired frame ends up in exactly one of `skipped_first`, `dropped`,
/// `delivered`, `discarded_on_stop` or a failed delivery, and every buffer is
/// disposed exactly once: `buffers_issued - buffers_disposed` is the number of
/// frames still alive (queued, in a callback, or preserved).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub frames_acquired: u64,
    pub frames_skipped_first: u64,
    pub frames_dropped: u64,
    pub frames_delivered: u64,
    pub frames_discarded_on_stop: u64,
    pub frames_preserved: u64,
    pub buffers_issued: u64,
    pub buffers_reused: u64,
    pub buffers_disposed: u64,
}

impl CaptureStats {
    /// Frames whose buffers have not been disposed yet.
    pub fn buffers_outstanding(&self) -> u64 {
        self.buffers_issued.saturating_sub(self.buffers_disposed)
    }
}

#[derive(Debug, Default)]
pub(crate) struct CaptureCounters {
    pub(crate) acquired: AtomicU64,
    pub(crate) skipped_first: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) delivered: AtomicU64,
    pub(crate) discarded_on_stop: AtomicU64,
    pub(crate) preserved: AtomicU64,
}

pub(crate) fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::SeqCst);
}

/// Counters plus the buffer pool of one cycle.
pub(crate) struct CycleMetrics {
    pub(crate) counters: CaptureCounters,
    pub(crate) pool: Arc<BufferPool>,
}

impl CycleMetrics {
    pub(crate) fn new(max_pooled_buffers: usize) -> Self {
        Self {
            counters: CaptureCounters::default(),
            pool: BufferPool::new(max_pooled_buffers),
        }
    }

    pub(crate) fn snapshot(&self) -> CaptureStats {
        let load = |counter: &AtomicU64| counter.load(Ordering::SeqCst);
        CaptureStats {
            frames_acquired: load(&self.counters.acquired),
            frames_skipped_first: load(&self.counters.skipped_first),
            frames_dropped: load(&self.counters.dropped),
            frames_delivered: load(&self.counters.delivered),
            frames_discarded_on_stop: load(&self.counters.discarded_on_stop),
            frames_preserved: load(&self.counters.preserved),
            buffers_issued: self.pool.issued(),
            buffers_reused: self.pool.reused(),
            buffers_disposed: self.pool.disposed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reads_counters_and_pool() {
        let metrics = CycleMetrics::new(2);
        bump(&metrics.counters.acquired, 3);
        bump(&metrics.counters.dropped, 1);
        let buffer = metrics.pool.take(4);

        let stats = metrics.snapshot();
        assert_eq!(stats.frames_acquired, 3);
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.buffers_issued, 1);
        assert_eq!(stats.buffers_outstanding(), 1);

        drop(buffer);
        assert_eq!(metrics.snapshot().buffers_outstanding(), 0);
    }

    #[test]
    fn test_stats_serialize() {
        let json = serde_json::to_value(CaptureStats::default()).unwrap();
        assert_eq!(json["frames_acquired"], 0);
        assert_eq!(json["buffers_disposed"], 0);
    }
}
