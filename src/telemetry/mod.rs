//! Telemetry for dispatchers.
//!
//! Counters and a processing-latency histogram per dispatcher, plus
//! exporters. With the `telemetry` feature off, `Metrics` keeps only the
//! task counters, behind the same recording surface.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub mod export;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use export::{JsonExporter, LogExporter, MetricsExporter};

// Without the feature only the plain counters are kept, so the task
// accounting still adds up. No histogram, no timing.
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    pub struct Metrics {
        tasks_dispatched: AtomicU64,
        tasks_executed: AtomicU64,
        tasks_discarded: AtomicU64,
        tasks_panicked: AtomicU64,
        tasks_congested: AtomicU64,
        pool_growths: AtomicU64,
    }

    impl Metrics {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn record_dispatch(&self) {
            self.tasks_dispatched.fetch_add(1, Ordering::Relaxed);
        }

        pub fn record_task_execution(&self, _: u64) {
            self.tasks_executed.fetch_add(1, Ordering::Relaxed);
        }

        pub fn record_discarded(&self, count: u64) {
            self.tasks_discarded.fetch_add(count, Ordering::Relaxed);
        }

        pub fn record_task_panic(&self) {
            self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
        }

        pub fn record_congestion(&self) {
            self.tasks_congested.fetch_add(1, Ordering::Relaxed);
        }

        pub fn record_pool_growth(&self) {
            self.pool_growths.fetch_add(1, Ordering::Relaxed);
        }

        pub fn record_queue_wait(&self, _: u64) {}

        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                timestamp: None,
                uptime: Duration::ZERO,
                tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
                tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
                tasks_discarded: self.tasks_discarded.load(Ordering::Relaxed),
                tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
                tasks_congested: self.tasks_congested.load(Ordering::Relaxed),
                pool_growths: self.pool_growths.load(Ordering::Relaxed),
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub timestamp: Option<Instant>,
        pub uptime: Duration,
        pub tasks_dispatched: u64,
        pub tasks_executed: u64,
        pub tasks_discarded: u64,
        pub tasks_panicked: u64,
        pub tasks_congested: u64,
        pub pool_growths: u64,
    }

}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
