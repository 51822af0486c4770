//! Metrics hooks for counting filter operations
//!
//! Provides instrumentation points for monitoring operation latency,
//! saturation and contention on the shared store.
//!
//! ## Usage
//!
//! ```ignore
//! use counting_bloom_filter::metrics::{Metrics, MetricsRecorder};
//! use std::sync::Arc;
//!
//! let metrics = Arc::new(Metrics::new());
//! let filter = CountingBloomFilterService::new(store, codec, options)?
//!     .with_metrics(metrics.clone());
//!
//! filter.add("x").await?;
//! println!("{:?}", metrics.snapshot());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Why a guarded transaction was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// Stored config no longer matched the cached one
    Config,
    /// Counter bits changed between read and write
    State,
}

/// Metrics collector for filter operations
///
/// Thread-safe counters for monitoring filter behaviour.
#[derive(Default)]
pub struct Metrics {
    /// Total add calls that completed
    pub adds: AtomicU64,
    /// Add calls that made an absent element present
    pub insertions: AtomicU64,
    /// Add calls refused because the counter was at max_count
    pub saturations: AtomicU64,
    /// Total contains calls
    pub lookups_performed: AtomicU64,
    /// Contains calls that answered present
    pub lookups_positive: AtomicU64,
    /// Total remove calls that completed
    pub removes: AtomicU64,
    /// Remove calls that decremented a counter
    pub removals: AtomicU64,
    /// Transactions aborted by the config guard
    pub config_conflicts: AtomicU64,
    /// Writes aborted because counter bits changed concurrently
    pub state_conflicts: AtomicU64,
    /// Operations that gave up after the retry cap
    pub retries_exhausted: AtomicU64,
    /// Cumulative add time in nanoseconds
    pub add_time_ns: AtomicU64,
    /// Cumulative lookup time in nanoseconds
    pub lookup_time_ns: AtomicU64,
    /// Cumulative remove time in nanoseconds
    pub remove_time_ns: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed add
    ///
    /// # Arguments
    /// * `duration` - Time taken, retries included
    /// * `inserted` - Whether the element was absent before
    pub fn record_add(&self, duration: Duration, inserted: bool) {
        self.adds.fetch_add(1, Ordering::Relaxed);
        self.add_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if inserted {
            self.insertions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an add refused at the counter ceiling
    pub fn record_saturated(&self) {
        self.saturations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a lookup
    ///
    /// # Arguments
    /// * `duration` - Time taken, retries included
    /// * `found` - Whether the element was reported present (possibly false positive)
    pub fn record_lookup(&self, duration: Duration, found: bool) {
        self.lookups_performed.fetch_add(1, Ordering::Relaxed);
        self.lookup_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if found {
            self.lookups_positive.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a completed remove
    pub fn record_remove(&self, duration: Duration, removed: bool) {
        self.removes.fetch_add(1, Ordering::Relaxed);
        self.remove_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
        if removed {
            self.removals.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a rejected guarded transaction
    pub fn record_conflict(&self, kind: ConflictKind) {
        match kind {
            ConflictKind::Config => self.config_conflicts.fetch_add(1, Ordering::Relaxed),
            ConflictKind::State => self.state_conflicts.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record an operation that hit the retry cap
    pub fn record_retries_exhausted(&self) {
        self.retries_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            adds: self.adds.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            saturations: self.saturations.load(Ordering::Relaxed),
            lookups_performed: self.lookups_performed.load(Ordering::Relaxed),
            lookups_positive: self.lookups_positive.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            config_conflicts: self.config_conflicts.load(Ordering::Relaxed),
            state_conflicts: self.state_conflicts.load(Ordering::Relaxed),
            retries_exhausted: self.retries_exhausted.load(Ordering::Relaxed),
            avg_add_ns: average(&self.add_time_ns, &self.adds),
            avg_lookup_ns: average(&self.lookup_time_ns, &self.lookups_performed),
            avg_remove_ns: average(&self.remove_time_ns, &self.removes),
        }
    }

    /// Ratio of positive lookups to total lookups
    ///
    /// Includes both true positives and false positives.
    pub fn observed_positive_rate(&self) -> f64 {
        let total = self.lookups_performed.load(Ordering::Relaxed);
        let positive = self.lookups_positive.load(Ordering::Relaxed);
        if total > 0 {
            positive as f64 / total as f64
        } else {
            0.0
        }
    }
}

fn average(total: &AtomicU64, count: &AtomicU64) -> u64 {
    let count = count.load(Ordering::Relaxed);
    if count > 0 {
        total.load(Ordering::Relaxed) / count
    } else {
        0
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub adds: u64,
    pub insertions: u64,
    pub saturations: u64,
    pub lookups_performed: u64,
    pub lookups_positive: u64,
    pub removes: u64,
    pub removals: u64,
    pub config_conflicts: u64,
    pub state_conflicts: u64,
    pub retries_exhausted: u64,
    pub avg_add_ns: u64,
    pub avg_lookup_ns: u64,
    pub avg_remove_ns: u64,
}

/// Trait for custom metrics recording implementations
///
/// Implement this trait to integrate with external metrics systems
/// like Prometheus, StatsD, or OpenTelemetry.
pub trait MetricsRecorder: Send + Sync {
    fn record_add(&self, duration: Duration, inserted: bool);

    fn record_saturated(&self);

    fn record_lookup(&self, duration: Duration, found: bool);

    fn record_remove(&self, duration: Duration, removed: bool);

    fn record_conflict(&self, kind: ConflictKind);

    fn record_retries_exhausted(&self);
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_add(&self, _: Duration, _: bool) {}
    fn record_saturated(&self) {}
    fn record_lookup(&self, _: Duration, _: bool) {}
    fn record_remove(&self, _: Duration, _: bool) {}
    fn record_conflict(&self, _: ConflictKind) {}
    fn record_retries_exhausted(&self) {}
}

impl MetricsRecorder for Metrics {
    fn record_add(&self, duration: Duration, inserted: bool) {
        Metrics::record_add(self, duration, inserted);
    }

    fn record_saturated(&self) {
        Metrics::record_saturated(self);
    }

    fn record_lookup(&self, duration: Duration, found: bool) {
        Metrics::record_lookup(self, duration, found);
    }

    fn record_remove(&self, duration: Duration, removed: bool) {
        Metrics::record_remove(self, duration, removed);
    }

    fn record_conflict(&self, kind: ConflictKind) {
        Metrics::record_conflict(self, kind);
    }

    fn record_retries_exhausted(&self) {
        Metrics::record_retries_exhausted(self);
    }
}
