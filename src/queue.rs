//! Unbounded FIFO queue shared between producers and workers.
//!
//! The queue and the shutdown flag live under one lock, so a worker either
//! sees an item or sees the close, never a torn view of both. Capacity is
//! unbounded: when production outruns consumption the queue simply grows.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

#[derive(Debug)]
pub struct FifoQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

impl<T> FifoQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Append to the tail and wake one waiting consumer.
    ///
    /// Hands the item back if the queue has been closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);

        self.available.notify_one();
        Ok(())
    }

    /// Remove the head without waiting.
    pub fn pop_front(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Block until an item is available or the queue is closed.
    ///
    /// Returns the item together with the queue length left behind it.
    /// `on_dequeue` runs while the lock is still held, right after the item
    /// is removed. Once the queue is closed, `drain` decides whether the
    /// remaining items are still handed out (`true`) or left behind (`false`).
    pub fn pop_blocking<F>(&self, drain: bool, on_dequeue: F) -> Option<(T, usize)>
    where
        F: FnOnce(),
    {
        let mut state = self.state.lock();
        loop {
            if state.closed && !drain {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                on_dequeue();
                let remaining = state.items.len();
                return Some((item, remaining));
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    /// Mark the queue closed and wake every waiter.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        let was_open = !state.closed;
        state.closed = true;
        drop(state);

        self.available.notify_all();
        was_open
    }

    /// Take every item still queued.
    pub fn take_all(&self) -> Vec<T> {
        self.state.lock().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl<T> Default for FifoQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
