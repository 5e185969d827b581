//! Metrics kept by the RIB daemon.
//!
//! Activity counters, state gauges and one latency histogram, all backed by
//! relaxed atomics so the service can bump them from anywhere without
//! coordination. [`RibMetrics`] is the aggregate the service layer owns.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Monotonically increasing event count.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn increment(&self) {
        self.0.fetch_add(1, Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Relaxed)
    }
}

/// Last-write-wins measurement of a current quantity.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, value: u64) {
        self.0.store(value, Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.0.load(Relaxed)
    }
}

/// Bucketed latency distribution.
///
/// `boundaries` are inclusive upper bounds; one extra bucket at the end
/// collects everything above the last boundary.
#[derive(Debug)]
pub struct Histogram {
    boundaries: Vec<u64>,
    buckets: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new(boundaries: Vec<u64>) -> Self {
        let buckets = std::iter::repeat_with(AtomicU64::default)
            .take(boundaries.len() + 1)
            .collect();
        Self {
            boundaries,
            buckets,
            sum: AtomicU64::default(),
            count: AtomicU64::default(),
        }
    }

    pub fn observe(&self, value: u64) {
        let bucket = self
            .boundaries
            .iter()
            .position(|&bound| value <= bound)
            .unwrap_or(self.boundaries.len());
        self.buckets[bucket].fetch_add(1, Relaxed);
        self.sum.fetch_add(value, Relaxed);
        self.count.fetch_add(1, Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Relaxed)
    }

    pub fn average(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.sum() as f64 / n as f64,
        }
    }

    /// Per-bucket observation counts; the final entry is the overflow
    /// bucket.
    pub fn counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.load(Relaxed)).collect()
    }
}

/// Aggregate metrics for the RIB daemon.
#[derive(Debug)]
pub struct RibMetrics {
    // Registration churn
    pub registers_received: Counter,
    pub unregisters_received: Counter,
    pub routes_added: Counter,
    pub routes_removed: Counter,
    pub routes_expired: Counter,
    pub entries_inserted: Counter,
    pub entries_erased: Counter,

    // Face lifecycle
    pub faces_removed: Counter,

    // FIB coordination
    pub fib_updates_sent: Counter,
    pub fib_update_successes: Counter,
    pub fib_update_failures: Counter,
    pub fib_update_time_us: Histogram,

    // Current state
    pub n_routes: Gauge,
    pub n_entries: Gauge,
    pub update_queue_depth: Gauge,
}

impl RibMetrics {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for RibMetrics {
    fn default() -> Self {
        Self {
            registers_received: Counter::default(),
            unregisters_received: Counter::default(),
            routes_added: Counter::default(),
            routes_removed: Counter::default(),
            routes_expired: Counter::default(),
            entries_inserted: Counter::default(),
            entries_erased: Counter::default(),
            faces_removed: Counter::default(),
            fib_updates_sent: Counter::default(),
            fib_update_successes: Counter::default(),
            fib_update_failures: Counter::default(),
            fib_update_time_us: Histogram::new(vec![
                10, 100, 1_000, 10_000, 100_000, 1_000_000,
            ]),
            n_routes: Gauge::default(),
            n_entries: Gauge::default(),
            update_queue_depth: Gauge::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_and_gauge() {
        let c = Counter::default();
        c.increment();
        c.increment();
        assert_eq!(c.value(), 2);

        let g = Gauge::default();
        assert_eq!(g.value(), 0);
        g.set(7);
        g.set(3);
        assert_eq!(g.value(), 3);
    }

    #[test]
    fn histogram_buckets() {
        let h = Histogram::new(vec![10, 100]);
        h.observe(5);
        h.observe(50);
        h.observe(500);

        assert_eq!(h.counts(), vec![1, 1, 1]);
        assert_eq!(h.count(), 3);
        assert_eq!(h.sum(), 555);
        assert_eq!(h.average(), 185.0);
    }

    #[test]
    fn histogram_boundary_is_inclusive() {
        let h = Histogram::new(vec![10]);
        h.observe(10);
        h.observe(11);
        assert_eq!(h.counts(), vec![1, 1]);
    }
}
