//! The unit of work accepted by a dispatcher.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Work submitted to a [`Dispatcher`](crate::Dispatcher).
///
/// `process` runs exactly once per dequeued task, on a worker thread. The
/// dispatcher passes two advisory inputs:
///
/// * `congested` is `true` when no idle worker was left and the pool had
///   already reached its ceiling at the moment this task was dequeued.
/// * `queue_len` is the number of tasks still waiting right after the dequeue.
///
/// What to do with them is up to the implementation: ignore them, skip the
/// work, or apply some custom backpressure. The dispatcher never drops or
/// retries a task on its own account.
pub trait Task: Send + Sync {
    /// Run the task.
    fn process(&self, congested: bool, queue_len: usize);

    /// Wall-clock duration of the preceding `process` call, in nanoseconds.
    fn process_lapse(&self, _elapsed_ns: u64) {}
}

impl<T: Task + ?Sized> Task for Arc<T> {
    fn process(&self, congested: bool, queue_len: usize) {
        (**self).process(congested, queue_len)
    }

    fn process_lapse(&self, elapsed_ns: u64) {
        (**self).process_lapse(elapsed_ns)
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn process(&self, congested: bool, queue_len: usize) {
        (**self).process(congested, queue_len)
    }

    fn process_lapse(&self, elapsed_ns: u64) {
        (**self).process_lapse(elapsed_ns)
    }
}

/// Adapts a closure into a [`Task`].
pub struct FnTask<F> {
    func: F,
}

impl<F> FnTask<F>
where
    F: Fn(bool, usize) + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn(bool, usize) + Send + Sync,
{
    fn process(&self, congested: bool, queue_len: usize) {
        (self.func)(congested, queue_len)
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").finish_non_exhaustive()
    }
}

/// Shorthand for `Arc::new(FnTask::new(func))`.
pub fn task_fn<F>(func: F) -> Arc<dyn Task>
where
    F: Fn(bool, usize) + Send + Sync + 'static,
{
    Arc::new(FnTask::new(func))
}

/// A task sitting in the queue, stamped with its enqueue time.
pub(crate) struct Job {
    pub(crate) task: Arc<dyn Task>,
    pub(crate) enqueued_at: Instant,
}

impl Job {
    pub(crate) fn new(task: Arc<dyn Task>) -> Self {
        Job {
            task,
            enqueued_at: Instant::now(),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("enqueued_at", &self.enqueued_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        calls: Mutex<Vec<(bool, usize)>>,
        lapses: Mutex<Vec<u64>>,
    }

    impl Task for Recorder {
        fn process(&self, congested: bool, queue_len: usize) {
            self.calls.lock().push((congested, queue_len));
        }

        fn process_lapse(&self, elapsed_ns: u64) {
            self.lapses.lock().push(elapsed_ns);
        }
    }

    #[test]
    fn test_arc_forwards_both_methods() {
        let recorder = Arc::new(Recorder {
            calls: Mutex::new(Vec::new()),
            lapses: Mutex::new(Vec::new()),
        });
        let task: Arc<dyn Task> = recorder.clone();

        task.process(true, 3);
        task.process_lapse(42);

        assert_eq!(*recorder.calls.lock(), vec![(true, 3)]);
        assert_eq!(*recorder.lapses.lock(), vec![42]);
    }

    #[test]
    fn test_fn_task() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        let task = task_fn(move |congested, len| {
            *seen_clone.lock() = Some((congested, len));
        });

        task.process(false, 7);
        // default lapse is a no-op
        task.process_lapse(1);

        assert_eq!(*seen.lock(), Some((false, 7)));
    }
}
