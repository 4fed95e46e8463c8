//! Per-index performance metrics
//!
//! - Operation counters only increase
//! - Item count and index size track current state
//! - Reset only when the index is deleted
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Operational counters for one index.
///
/// Uses Relaxed ordering; metrics are advisory.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    adds: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
    searches: AtomicU64,
    rebuilds: AtomicU64,
    errors: AtomicU64,
    item_count: AtomicU64,
    index_size: AtomicU64,
}

impl PerformanceMetrics {
    /// Create metrics with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create metrics seeded with persisted state
    pub fn with_state(item_count: u64, index_size: u64) -> Self {
        let metrics = Self::default();
        metrics.item_count.store(item_count, Ordering::Relaxed);
        metrics.index_size.store(index_size, Ordering::Relaxed);
        metrics
    }

    pub fn increment_adds(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_removes(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_searches(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rebuilds(&self) {
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the current item count
    pub fn item_added(&self) {
        self.item_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the current item count, saturating at zero
    pub fn item_removed(&self) {
        let _ = self
            .item_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Adjust index size by a signed byte delta, saturating at zero
    pub fn adjust_size(&self, delta: i64) {
        let _ = self
            .index_size
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(if delta >= 0 {
                    n.saturating_add(delta as u64)
                } else {
                    n.saturating_sub(delta.unsigned_abs())
                })
            });
    }

    /// Overwrite current state (after a directory scan or clear)
    pub fn reset_state(&self, item_count: u64, index_size: u64) {
        self.item_count.store(item_count, Ordering::Relaxed);
        self.index_size.store(index_size, Ordering::Relaxed);
    }

    pub fn item_count(&self) -> u64 {
        self.item_count.load(Ordering::Relaxed)
    }

    pub fn index_size(&self) -> u64 {
        self.index_size.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            adds: self.adds.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            rebuilds: self.rebuilds.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            item_count: self.item_count(),
            index_size: self.index_size(),
        }
    }
}

/// Point-in-time snapshot of metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub adds: u64,
    pub updates: u64,
    pub removes: u64,
    pub searches: u64,
    pub rebuilds: u64,
    pub errors: u64,
    pub item_count: u64,
    pub index_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_increase() {
        let m = PerformanceMetrics::new();
        m.increment_adds();
        m.increment_adds();
        m.increment_searches();

        let s = m.snapshot();
        assert_eq!(s.adds, 2);
        assert_eq!(s.searches, 1);
        assert_eq!(s.removes, 0);
    }

    #[test]
    fn test_item_count_saturates() {
        let m = PerformanceMetrics::new();
        m.item_removed();
        assert_eq!(m.item_count(), 0);

        m.item_added();
        m.item_added();
        m.item_removed();
        assert_eq!(m.item_count(), 1);
    }

    #[test]
    fn test_size_delta() {
        let m = PerformanceMetrics::with_state(0, 100);
        m.adjust_size(50);
        assert_eq!(m.index_size(), 150);
        m.adjust_size(-500);
        assert_eq!(m.index_size(), 0);
    }

    #[test]
    fn test_concurrent_increments() {
        use std::sync::Arc;
        use std::thread;

        let m = Arc::new(PerformanceMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.item_added();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.item_count(), 800);
    }
}
