//! Node store I/O statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by the [`NodeStore`](super::NodeStore).
///
/// All fields are atomic so reads through `&self` can bump them.
/// `Ordering::Relaxed` is enough: the counters are independent.
///
/// # Example
/// ```
/// use genebank::StoreStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = StoreStats::new();
/// stats.nodes_read.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().nodes_read, 1);
/// ```
#[derive(Debug)]
pub struct StoreStats {
    /// Node records read from disk.
    pub nodes_read: AtomicU64,

    /// Node records written to disk.
    pub nodes_written: AtomicU64,

    /// Slots handed out by the allocator.
    pub nodes_allocated: AtomicU64,

    /// Root pointer updates written to the header.
    pub root_updates: AtomicU64,
}

impl StoreStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self {
            nodes_read: AtomicU64::new(0),
            nodes_written: AtomicU64::new(0),
            nodes_allocated: AtomicU64::new(0),
            root_updates: AtomicU64::new(0),
        }
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            nodes_read: self.nodes_read.load(Ordering::Relaxed),
            nodes_written: self.nodes_written.load(Ordering::Relaxed),
            nodes_allocated: self.nodes_allocated.load(Ordering::Relaxed),
            root_updates: self.root_updates.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.nodes_read.store(0, Ordering::Relaxed);
        self.nodes_written.store(0, Ordering::Relaxed);
        self.nodes_allocated.store(0, Ordering::Relaxed);
        self.root_updates.store(0, Ordering::Relaxed);
    }
}

impl Default for StoreStats {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub nodes_read: u64,
    pub nodes_written: u64,
    pub nodes_allocated: u64,
    pub root_updates: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ reads: {}, writes: {}, allocated: {}, root_updates: {} }}",
            self.nodes_read, self.nodes_written, self.nodes_allocated, self.root_updates
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_snapshot_and_reset() {
        let stats = StoreStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());

        stats.nodes_read.fetch_add(7, Ordering::Relaxed);
        stats.nodes_written.fetch_add(3, Ordering::Relaxed);
        stats.nodes_allocated.fetch_add(1, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.nodes_read, 7);
        assert_eq!(snapshot.nodes_written, 3);
        assert_eq!(snapshot.nodes_allocated, 1);
        assert_eq!(snapshot.root_updates, 0);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_stats_display() {
        let stats = StoreStats::new();
        stats.nodes_read.fetch_add(80, Ordering::Relaxed);
        stats.nodes_written.fetch_add(20, Ordering::Relaxed);

        let display = format!("{}", stats.snapshot());
        assert!(display.contains("reads: 80"));
        assert!(display.contains("writes: 20"));
    }
}
