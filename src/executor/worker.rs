// worker thread loop
use super::pool::PoolShared;
use super::task::Job;
use crate::config::ShutdownPolicy;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

/// Lifecycle of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for work or for shutdown.
    Idle,
    /// Running one task.
    Busy,
    /// Observed shutdown and left the loop.
    Terminated,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Busy,
            _ => WorkerState::Terminated,
        }
    }
}

// stats for each worker, readable from outside the thread
#[derive(Debug)]
pub(crate) struct WorkerStats {
    state: AtomicU8,
    pub(crate) tasks_executed: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Idle as u8),
            tasks_executed: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub stats: Arc<WorkerStats>,
    shared: Arc<PoolShared>,
}

impl Worker {
    pub fn new(id: WorkerId, shared: Arc<PoolShared>) -> Self {
        Self {
            id,
            stats: Arc::new(WorkerStats::new()),
            shared,
        }
    }

    // main loop
    pub fn run(&self) {
        let drain = self.shared.shutdown_policy == ShutdownPolicy::Drain;

        loop {
            self.stats.set_state(WorkerState::Idle);

            let mut congested = false;
            let popped = self
                .shared
                .queue
                .pop_blocking(drain, || congested = self.claim());

            let Some((job, queue_len)) = popped else {
                break;
            };

            self.execute_job(job, congested, queue_len);
            self.shared.busy.fetch_sub(1, Ordering::AcqRel);
        }

        self.stats.set_state(WorkerState::Terminated);
        tracing::debug!(
            dispatcher = %self.shared.name,
            worker = self.id,
            "worker terminated"
        );
    }

    /// Mark this worker busy and report whether the pool is congested.
    /// Runs under the queue lock, at the instant a job is taken.
    fn claim(&self) -> bool {
        let busy = self.shared.busy.fetch_add(1, Ordering::AcqRel) + 1;
        self.stats.set_state(WorkerState::Busy);
        self.shared.is_congested_with(busy)
    }

    fn execute_job(&self, job: Job, congested: bool, queue_len: usize) {
        let shared = &self.shared;
        let task = job.task;

        shared
            .metrics
            .record_queue_wait(job.enqueued_at.elapsed().as_nanos() as u64);
        if congested {
            shared.metrics.record_congestion();
        }

        let start = Instant::now();
        let result = shared
            .panic_handler
            .execute(&shared.name, || task.process(congested, queue_len));
        let elapsed_ns = start.elapsed().as_nanos() as u64;

        if result.is_err() {
            shared.metrics.record_task_panic();
        }

        if shared
            .panic_handler
            .execute(&shared.name, || task.process_lapse(elapsed_ns))
            .is_err()
        {
            shared.metrics.record_task_panic();
        }

        shared.metrics.record_task_execution(elapsed_ns);
        self.stats.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }
}
