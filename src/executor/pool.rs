use super::panic_handler::PanicHandler;
use super::task::Job;
use super::worker::{Worker, WorkerId, WorkerState, WorkerStats};
use crate::config::{Config, ShutdownPolicy};
use crate::error::{Error, Result};
use crate::queue::FifoQueue;
use crate::telemetry::Metrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[cfg(target_os = "linux")]
fn pin_thread_to_core(core_id: usize) -> bool {
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        result == 0
    }
}

/// State shared between the pool and every worker thread.
pub(crate) struct PoolShared {
    pub(crate) name: String,
    pub(crate) queue: FifoQueue<Job>,
    pub(crate) busy: AtomicUsize,
    pub(crate) worker_count: AtomicUsize,
    pub(crate) max_workers: usize,
    pub(crate) shutdown_policy: ShutdownPolicy,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) metrics: Arc<Metrics>,
}

impl PoolShared {
    /// No idle worker left and no room to grow, given `busy` busy workers.
    pub(crate) fn is_congested_with(&self, busy: usize) -> bool {
        let count = self.worker_count.load(Ordering::Acquire);
        busy == count && count == self.max_workers
    }
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

/// Worker pool that starts at `initial_workers` and grows on demand up to
/// `max_workers`. It never shrinks.
pub(crate) struct ElasticPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<WorkerHandle>>,
    initial_workers: usize,
    thread_name_prefix: String,
    stack_size: Option<usize>,
    pin_workers: bool,
}

impl ElasticPool {
    /// Spawn the initial workers. `config` must already be normalized.
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        debug_assert!(config.initial_workers >= 1, "config must be normalized");

        let shared = Arc::new(PoolShared {
            name: config.name.clone(),
            queue: FifoQueue::new(),
            busy: AtomicUsize::new(0),
            worker_count: AtomicUsize::new(0),
            max_workers: config.max_workers,
            shutdown_policy: config.shutdown_policy,
            panic_handler: PanicHandler::new(config.panic_strategy),
            metrics,
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(config.max_workers)),
            initial_workers: config.initial_workers,
            thread_name_prefix: config.thread_name_prefix.clone(),
            stack_size: config.stack_size,
            pin_workers: config.pin_workers,
        };

        {
            let mut workers = pool.workers.lock();
            for _ in 0..config.initial_workers {
                // on failure, dropping `pool` joins what was already spawned
                pool.spawn_worker(&mut workers)?;
            }
        }

        Ok(pool)
    }

    fn spawn_worker(&self, workers: &mut Vec<WorkerHandle>) -> Result<WorkerId> {
        let id = workers.len();
        let worker = Worker::new(id, self.shared.clone());
        let stats = worker.stats.clone();
        let name = format!("{}-{}", self.thread_name_prefix, id);

        let mut builder = thread::Builder::new().name(name);

        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pin_workers = self.pin_workers;
        let dispatcher = self.shared.name.clone();
        let thread = builder
            .spawn(move || {
                #[cfg(target_os = "linux")]
                if pin_workers {
                    let core = worker.id % num_cpus::get().max(1);
                    if !pin_thread_to_core(core) {
                        tracing::warn!(
                            dispatcher = %dispatcher,
                            worker = worker.id,
                            core,
                            "failed to pin worker to core"
                        );
                    }
                }
                #[cfg(not(target_os = "linux"))]
                let _ = (pin_workers, dispatcher);

                worker.run();
            })
            .map_err(|e| Error::spawn(format!("worker {}: {}", id, e)))?;

        workers.push(WorkerHandle {
            id,
            thread: Some(thread),
            stats,
        });
        self.shared.worker_count.store(workers.len(), Ordering::Release);

        tracing::debug!(
            dispatcher = %self.shared.name,
            worker = id,
            "spawned worker"
        );

        Ok(id)
    }

    /// Add one worker if every current worker is busy and the ceiling has not
    /// been reached. Returns whether the pool grew.
    ///
    /// The busy count is a best-effort snapshot, but the check and the append
    /// happen under the worker-list lock, so concurrent callers can never push
    /// the pool past `max_workers`.
    pub fn maybe_grow(&self) -> Result<bool> {
        // lock-free early out for the common case
        if !self.wants_growth(self.worker_count()) {
            return Ok(false);
        }

        let mut workers = self.workers.lock();
        if !self.wants_growth(workers.len()) || self.shared.queue.is_closed() {
            return Ok(false);
        }

        let id = self.spawn_worker(&mut workers)?;
        self.shared.metrics.record_pool_growth();

        tracing::info!(
            dispatcher = %self.shared.name,
            worker = id,
            workers = workers.len(),
            max_workers = self.shared.max_workers,
            "all workers busy, grew pool"
        );

        Ok(true)
    }

    fn wants_growth(&self, count: usize) -> bool {
        let busy = self.shared.busy.load(Ordering::Acquire);
        busy >= count && count < self.shared.max_workers
    }

    /// Push a job and wake one idle worker. Hands the job back after shutdown.
    pub fn submit(&self, job: Job) -> std::result::Result<(), Job> {
        self.shared.queue.push(job)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.shared.metrics
    }

    pub fn initial_workers(&self) -> usize {
        self.initial_workers
    }

    pub fn worker_count(&self) -> usize {
        self.shared.worker_count.load(Ordering::Acquire)
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    pub fn busy_workers(&self) -> usize {
        self.shared.busy.load(Ordering::Acquire)
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.lock().iter().map(|w| w.stats.state()).collect()
    }

    pub fn tasks_executed_per_worker(&self) -> Vec<u64> {
        self.workers
            .lock()
            .iter()
            .map(|w| w.stats.tasks_executed.load(Ordering::Relaxed))
            .collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.queue.is_closed()
    }

    /// Close the queue, wake every worker and join them all.
    ///
    /// Blocks until each worker has returned, with no timeout. Whatever is
    /// left in the queue afterwards is dropped and returned as a count.
    ///
    /// When called from one of the pool's own workers (a task dropped the
    /// last handle to its dispatcher), that worker is detached instead of
    /// joined. It exits on its own once the running task returns.
    pub fn shutdown(&self) -> Result<usize> {
        if self.shared.queue.close() {
            tracing::info!(
                dispatcher = %self.shared.name,
                workers = self.worker_count(),
                queued = self.queue_len(),
                policy = ?self.shared.shutdown_policy,
                "shutting down workers"
            );
        }

        let handles: Vec<(WorkerId, JoinHandle<()>)> = self
            .workers
            .lock()
            .iter_mut()
            .filter_map(|w| w.thread.take().map(|t| (w.id, t)))
            .collect();

        let current = thread::current().id();
        let mut first_panic = None;
        for (id, thread) in handles {
            if thread.thread().id() == current {
                tracing::debug!(
                    dispatcher = %self.shared.name,
                    worker = id,
                    "shutdown called from this worker, detaching it"
                );
                continue;
            }

            tracing::debug!(
                dispatcher = %self.shared.name,
                worker = id,
                "joining worker"
            );
            if let Err(payload) = thread.join() {
                let info = super::panic_handler::PanicInfo::from_payload(payload);
                tracing::error!(
                    dispatcher = %self.shared.name,
                    worker = id,
                    message = %info.message,
                    "worker thread panicked"
                );
                first_panic.get_or_insert(info);
            }
        }

        let discarded = self.shared.queue.take_all().len();
        if discarded > 0 {
            self.shared.metrics.record_discarded(discarded as u64);
            tracing::warn!(
                dispatcher = %self.shared.name,
                discarded,
                "discarded queued tasks on shutdown"
            );
        }

        match first_panic {
            Some(info) => Err(info.into()),
            None => Ok(discarded),
        }
    }
}

impl Drop for ElasticPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
