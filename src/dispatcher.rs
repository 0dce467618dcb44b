//! The public face of the crate: a named FIFO queue drained by an elastic
//! pool of worker threads.

use crate::config::Config;
use crate::error::Result;
use crate::executor::pool::ElasticPool;
use crate::executor::task::{FnTask, Job, Task};
use crate::executor::WorkerState;
use crate::telemetry::{Metrics, MetricsSnapshot};
use std::fmt;
use std::sync::Arc;

/// FIFO task dispatcher.
///
/// Tasks are consumed in arrival order by a pool of worker threads. The pool
/// starts with `initial_workers` threads and, when a task arrives while every
/// worker is busy, grows by one thread at a time up to `max_workers`. Once the
/// ceiling is reached, further bursts only lengthen the queue, and tasks are
/// told about it through the `congested` flag of [`Task::process`].
///
/// Dropping the dispatcher shuts it down and blocks until every worker has
/// exited. See [`ShutdownPolicy`](crate::ShutdownPolicy) for what happens to
/// tasks still queued at that point.
pub struct Dispatcher {
    pool: ElasticPool,
    config: Config,
}

impl Dispatcher {
    /// Create a dispatcher and spawn its initial workers.
    ///
    /// Bad bounds are corrected rather than rejected: `initial_workers == 0`
    /// becomes 1, and a `max_workers` below that is raised to match it. Use
    /// [`Config::builder`] with `strict(true)` to get an error instead.
    pub fn new<S: Into<String>>(name: S, initial_workers: usize, max_workers: usize) -> Result<Self> {
        Self::with_config(Config::with_bounds(name, initial_workers, max_workers))
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let config = config.normalized();

        if config.is_elastic() {
            tracing::info!(
                dispatcher = %config.name,
                initial_workers = config.initial_workers,
                max_workers = config.max_workers,
                "creating dispatch queue with elastic worker pool"
            );
        } else {
            tracing::info!(
                dispatcher = %config.name,
                workers = config.initial_workers,
                "creating dispatch queue with fixed worker pool"
            );
        }

        let pool = ElasticPool::new(&config, Arc::new(Metrics::new()))?;

        Ok(Self { pool, config })
    }

    /// Queue a task. Never blocks.
    ///
    /// If every worker is busy and the pool is below its ceiling, one worker
    /// is added first. A task dispatched after [`shutdown`](Self::shutdown)
    /// is dropped unexecuted.
    pub fn dispatch(&self, task: Arc<dyn Task>) {
        if let Err(e) = self.pool.maybe_grow() {
            tracing::warn!(
                dispatcher = %self.name(),
                error = %e,
                "could not grow worker pool"
            );
        }

        self.pool.metrics().record_dispatch();

        if self.pool.submit(Job::new(task)).is_err() {
            self.pool.metrics().record_discarded(1);
            tracing::warn!(
                dispatcher = %self.name(),
                "dispatcher is shut down, task discarded"
            );
        }
    }

    /// Queue a closure as a task.
    pub fn dispatch_fn<F>(&self, func: F)
    where
        F: Fn(bool, usize) + Send + Sync + 'static,
    {
        self.dispatch(Arc::new(FnTask::new(func)));
    }

    pub fn name(&self) -> &str {
        self.pool.name()
    }

    /// Number of workers spawned so far.
    pub fn worker_count(&self) -> usize {
        self.pool.worker_count()
    }

    pub fn initial_workers(&self) -> usize {
        self.pool.initial_workers()
    }

    pub fn max_workers(&self) -> usize {
        self.pool.max_workers()
    }

    /// Workers currently running a task.
    pub fn busy_workers(&self) -> usize {
        self.pool.busy_workers()
    }

    /// Tasks waiting for a worker.
    pub fn queue_len(&self) -> usize {
        self.pool.queue_len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State of each worker, indexed by worker id.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.pool.worker_states()
    }

    /// Tasks executed by each worker, indexed by worker id.
    pub fn tasks_executed_per_worker(&self) -> Vec<u64> {
        self.pool.tasks_executed_per_worker()
    }

    /// Point-in-time view of the pool and queue. The fields are read one
    /// after another, not atomically as a group.
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            name: self.name().to_string(),
            worker_count: self.worker_count(),
            max_workers: self.max_workers(),
            busy_workers: self.busy_workers(),
            queue_len: self.queue_len(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.pool.metrics().snapshot()
    }

    pub fn is_shut_down(&self) -> bool {
        self.pool.is_shut_down()
    }

    /// Stop accepting work, wake every worker and wait for all of them.
    ///
    /// A task already running is allowed to finish; there is no timeout.
    /// Returns how many queued tasks were discarded. Calling it again is a
    /// no-op returning `Ok(0)`.
    pub fn shutdown(&mut self) -> Result<usize> {
        let was_running = !self.is_shut_down();
        let discarded = self.pool.shutdown()?;
        if was_running {
            tracing::info!(
                dispatcher = %self.name(),
                discarded,
                "dispatcher shut down"
            );
        }
        Ok(discarded)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            if let Err(e) = self.shutdown() {
                tracing::error!(
                    dispatcher = %self.name(),
                    error = %e,
                    "error during dispatcher shutdown"
                );
            }
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("name", &self.name())
            .field("worker_count", &self.worker_count())
            .field("max_workers", &self.max_workers())
            .field("busy_workers", &self.busy_workers())
            .field("queue_len", &self.queue_len())
            .finish()
    }
}

/// Snapshot returned by [`Dispatcher::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub name: String,
    pub worker_count: usize,
    pub max_workers: usize,
    pub busy_workers: usize,
    pub queue_len: usize,
}

impl DispatcherStats {
    /// No idle worker and no room to grow.
    pub fn is_congested(&self) -> bool {
        self.busy_workers >= self.worker_count && self.worker_count == self.max_workers
    }
}

impl fmt::Display for DispatcherStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] workers: {} | max workers: {} | busy: {} | queued: {}",
            self.name, self.worker_count, self.max_workers, self.busy_workers, self.queue_len
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_until<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn test_initial_workers_spawned() {
        let dispatcher = Dispatcher::new("init", 3, 5).unwrap();
        assert_eq!(dispatcher.worker_count(), 3);
        assert_eq!(dispatcher.initial_workers(), 3);
        assert_eq!(dispatcher.max_workers(), 5);
        assert_eq!(dispatcher.busy_workers(), 0);
        assert_eq!(dispatcher.queue_len(), 0);
        assert_eq!(dispatcher.name(), "init");
    }

    #[test]
    fn test_bad_bounds_are_corrected() {
        let dispatcher = Dispatcher::new("bad", 0, 0).unwrap();
        assert_eq!(dispatcher.worker_count(), 1);
        assert_eq!(dispatcher.max_workers(), 1);

        let dispatcher = Dispatcher::new("bad", 3, 1).unwrap();
        assert_eq!(dispatcher.worker_count(), 3);
        assert_eq!(dispatcher.max_workers(), 3);
    }

    #[test]
    fn test_dispatch_fn_runs() {
        let dispatcher = Dispatcher::new("fn", 2, 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = counter.clone();
            dispatcher.dispatch_fn(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert!(wait_until(Duration::from_secs(5), || counter.load(Ordering::SeqCst) == 10));
        assert_eq!(dispatcher.metrics().tasks_dispatched, 10);
    }

    #[test]
    fn test_workers_idle_then_terminated() {
        let mut dispatcher = Dispatcher::new("states", 2, 2).unwrap();
        assert!(wait_until(Duration::from_secs(1), || {
            dispatcher.worker_states().iter().all(|s| *s == WorkerState::Idle)
        }));

        dispatcher.shutdown().unwrap();
        assert_eq!(
            dispatcher.worker_states(),
            vec![WorkerState::Terminated, WorkerState::Terminated]
        );
        // worker count is not reduced by shutdown
        assert_eq!(dispatcher.worker_count(), 2);
    }

    #[test]
    fn test_dispatch_after_shutdown_is_discarded() {
        let mut dispatcher = Dispatcher::new("closed", 1, 1).unwrap();
        dispatcher.shutdown().unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        dispatcher.dispatch_fn(move |_, _| {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(dispatcher.queue_len(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.metrics().tasks_discarded, 1);
        assert_eq!(dispatcher.shutdown().unwrap(), 0);
    }

    #[test]
    fn test_busy_count_tracks_running_task() {
        let dispatcher = Dispatcher::new("busy", 1, 1).unwrap();
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock();

        let gate_clone = gate.clone();
        dispatcher.dispatch_fn(move |_, _| {
            let _g = gate_clone.lock();
        });

        assert!(wait_until(Duration::from_secs(2), || {
            dispatcher.busy_workers() == 1 && dispatcher.worker_states() == vec![WorkerState::Busy]
        }));
        assert!(dispatcher.stats().is_congested());

        drop(held);
        assert!(wait_until(Duration::from_secs(2), || dispatcher.busy_workers() == 0));
    }

    #[derive(Default)]
    struct MessageVisitor(Option<String>);

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = Some(format!("{:?}", value));
            }
        }
    }

    /// Counts events on the current thread whose message matches.
    struct CountMessages {
        message: &'static str,
        count: Arc<AtomicUsize>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CountMessages {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);
            if visitor.0.as_deref() == Some(self.message) {
                self.count.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_shutdown_logged_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CountMessages {
            message: "dispatcher shut down",
            count: count.clone(),
        });

        tracing::subscriber::with_default(subscriber, || {
            let mut dispatcher = Dispatcher::new("once", 1, 1).unwrap();
            assert_eq!(dispatcher.shutdown().unwrap(), 0);
            assert_eq!(dispatcher.shutdown().unwrap(), 0);
            drop(dispatcher);
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stats_display() {
        let stats = DispatcherStats {
            name: "q".to_string(),
            worker_count: 2,
            max_workers: 4,
            busy_workers: 1,
            queue_len: 0,
        };
        assert_eq!(
            stats.to_string(),
            "[q] workers: 2 | max workers: 4 | busy: 1 | queued: 0"
        );
        assert!(!stats.is_congested());
    }
}
