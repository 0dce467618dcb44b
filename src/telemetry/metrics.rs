//! Metrics collection for dispatcher monitoring.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-dispatcher metrics collector
#[derive(Debug)]
pub struct Metrics {
    // Task counters
    tasks_dispatched: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_discarded: AtomicU64,
    tasks_panicked: AtomicU64,
    tasks_congested: AtomicU64,

    // Pool growth events
    pool_growths: AtomicU64,

    // Timing metrics
    busy_time_ns: AtomicU64,
    queue_wait_ns: AtomicU64,

    // Processing latency, nanoseconds
    latency_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        // 3 significant figures, max value of 1 hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .expect("histogram bounds are constant and valid");

        Self {
            tasks_dispatched: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_discarded: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            tasks_congested: AtomicU64::new(0),
            pool_growths: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            queue_wait_ns: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub fn record_dispatch(&self) {
        self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one finished `process` call and how long it took.
    pub fn record_task_execution(&self, duration_ns: u64) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        self.busy_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        self.latency_histogram.write().saturating_record(duration_ns);
    }

    pub fn record_discarded(&self, count: u64) {
        self.tasks_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_task_panic(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// A task was handed the congestion flag.
    pub fn record_congestion(&self) {
        self.tasks_congested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pool_growth(&self) {
        self.pool_growths.fetch_add(1, Ordering::Relaxed);
    }

    /// Time a task spent queued before a worker picked it up.
    pub fn record_queue_wait(&self, duration_ns: u64) {
        self.queue_wait_ns.fetch_add(duration_ns, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();
        let tasks_executed = self.tasks_executed.load(Ordering::Relaxed);
        let queue_wait_ns = self.queue_wait_ns.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_executed,
            tasks_discarded: self.tasks_discarded.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            tasks_congested: self.tasks_congested.load(Ordering::Relaxed),
            pool_growths: self.pool_growths.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
            avg_queue_wait_ns: if tasks_executed > 0 {
                queue_wait_ns / tasks_executed
            } else {
                0
            },
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p95_latency_ns: histogram.value_at_quantile(0.95),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: Instant,
    pub uptime: Duration,
    pub tasks_dispatched: u64,
    pub tasks_executed: u64,
    pub tasks_discarded: u64,
    pub tasks_panicked: u64,
    pub tasks_congested: u64,
    pub pool_growths: u64,
    pub busy_time_ns: u64,
    pub avg_queue_wait_ns: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p95_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Share of executed tasks that ran under congestion (0.0 to 1.0)
    pub fn congestion_ratio(&self) -> f64 {
        if self.tasks_executed == 0 {
            return 0.0;
        }
        self.tasks_congested as f64 / self.tasks_executed as f64
    }

    /// Calculate tasks per second
    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_executed as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_dispatch();
        metrics.record_dispatch();
        metrics.record_task_execution(1000);
        metrics.record_task_execution(2000);
        metrics.record_congestion();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_dispatched, 2);
        assert_eq!(snapshot.tasks_executed, 2);
        assert_eq!(snapshot.busy_time_ns, 3000);
        assert!(snapshot.avg_latency_ns > 0);
        assert_eq!(snapshot.congestion_ratio(), 0.5);
    }

    #[test]
    fn test_queue_wait_average() {
        let metrics = Metrics::new();

        metrics.record_queue_wait(100);
        metrics.record_queue_wait(300);
        metrics.record_task_execution(10);
        metrics.record_task_execution(10);

        assert_eq!(metrics.snapshot().avg_queue_wait_ns, 200);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.tasks_executed, 0);
        assert_eq!(snapshot.avg_latency_ns, 0);
        assert_eq!(snapshot.congestion_ratio(), 0.0);
    }

    #[test]
    fn test_oversized_latency_is_clamped() {
        let metrics = Metrics::new();
        metrics.record_task_execution(u64::MAX);
        assert_eq!(metrics.snapshot().tasks_executed, 1);
    }
}
