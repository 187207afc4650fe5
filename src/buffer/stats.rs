//! Buffer pool counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Event counters bumped by the buffer pool.
///
/// Each counter is independent, so `Relaxed` ordering is enough. Read them
/// together through [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
    deletes: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_write(&self) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.disk_reads.load(Ordering::Relaxed),
            pages_written: self.disk_writes.load(Ordering::Relaxed),
            pages_deleted: self.deletes.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter. Not atomic as a whole: events racing with the
    /// reset may land on either side of it.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.disk_reads,
            &self.disk_writes,
            &self.deletes,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Plain copy of the counters at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_deleted: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches served without touching disk, `0.0` before any.
    pub fn hit_rate(&self) -> f64 {
        match self.cache_hits + self.cache_misses {
            0 => 0.0,
            total => self.cache_hits as f64 / total as f64,
        }
    }

    /// Events that happened between `earlier` and `self`.
    ///
    /// ```
    /// use pagedb::BufferPoolStats;
    ///
    /// let stats = BufferPoolStats::new();
    /// let before = stats.snapshot();
    /// // ... run a workload ...
    /// let delta = stats.snapshot().since(&before);
    /// assert_eq!(delta.evictions, 0);
    /// ```
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.saturating_sub(earlier.cache_hits),
            cache_misses: self.cache_misses.saturating_sub(earlier.cache_misses),
            evictions: self.evictions.saturating_sub(earlier.evictions),
            pages_read: self.pages_read.saturating_sub(earlier.pages_read),
            pages_written: self.pages_written.saturating_sub(earlier.pages_written),
            pages_deleted: self.pages_deleted.saturating_sub(earlier.pages_deleted),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} ({:.1}% hit) evictions={} disk_reads={} disk_writes={} deleted={}",
            self.cache_hits,
            self.cache_misses,
            self.hit_rate() * 100.0,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.pages_deleted,
        )
    }
}
