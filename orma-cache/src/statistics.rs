//! Hit/miss counters.
//!
//! [`CacheStatistics`] holds the four process-wide counters shared by both
//! tiers. [`RegionStatistics`] holds the extra per-relation counters of an
//! application cache region. All increments are atomic; reads are relaxed
//! snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

static GLOBAL: Lazy<Arc<CacheStatistics>> = Lazy::new(|| Arc::new(CacheStatistics::new()));

/// Record-cache and inverse-cache hit/miss counters.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    record_hits: AtomicU64,
    record_misses: AtomicU64,
    inverse_hits: AtomicU64,
    inverse_misses: AtomicU64,
}

impl CacheStatistics {
    /// Create a detached set of counters, starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide counters.
    pub fn global() -> Arc<CacheStatistics> {
        Arc::clone(&GLOBAL)
    }

    pub fn record_hit(&self) {
        self.record_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.record_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inverse_hit(&self) {
        self.inverse_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inverse_miss(&self) {
        self.inverse_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hits(&self) -> u64 {
        self.record_hits.load(Ordering::Relaxed)
    }

    pub fn record_misses(&self) -> u64 {
        self.record_misses.load(Ordering::Relaxed)
    }

    pub fn inverse_hits(&self) -> u64 {
        self.inverse_hits.load(Ordering::Relaxed)
    }

    pub fn inverse_misses(&self) -> u64 {
        self.inverse_misses.load(Ordering::Relaxed)
    }

    /// Get current snapshot of all counters.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            record_hits: self.record_hits(),
            record_misses: self.record_misses(),
            inverse_hits: self.inverse_hits(),
            inverse_misses: self.inverse_misses(),
        }
    }

    /// Administrative reset. Not used by normal cache operation.
    pub fn reset(&self) {
        self.record_hits.store(0, Ordering::Relaxed);
        self.record_misses.store(0, Ordering::Relaxed);
        self.inverse_hits.store(0, Ordering::Relaxed);
        self.inverse_misses.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of the counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatisticsSnapshot {
    pub record_hits: u64,
    pub record_misses: u64,
    pub inverse_hits: u64,
    pub inverse_misses: u64,
}

impl StatisticsSnapshot {
    /// Record-cache hit rate (0.0 to 1.0).
    pub fn record_hit_rate(&self) -> f64 {
        hit_rate(self.record_hits, self.record_misses)
    }

    /// Inverse-cache hit rate (0.0 to 1.0).
    pub fn inverse_hit_rate(&self) -> f64 {
        hit_rate(self.inverse_hits, self.inverse_misses)
    }
}

/// Per-relation counters of an application cache region.
#[derive(Debug, Default)]
pub struct RegionStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RegionStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        hit_rate(self.hits(), self.misses())
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
