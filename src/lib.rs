//! FIFO task dispatcher backed by an elastic pool of worker threads.
//!
//! Callers submit tasks to a named [`Dispatcher`]. Worker threads consume
//! them in arrival order. The pool starts at a fixed size and grows by one
//! thread whenever a task arrives while every worker is busy, up to a
//! configured ceiling. Past the ceiling the queue grows instead, and each task
//! is told through a `congested` flag so it can decide for itself whether to
//! do the work, skip it, or apply its own backpressure.
//!
//! # Quick Start
//!
//! ```no_run
//! use queue_dispatch::prelude::*;
//! use std::sync::Arc;
//!
//! struct Request(u64);
//!
//! impl Task for Request {
//!     fn process(&self, congested: bool, queue_len: usize) {
//!         if congested {
//!             println!("skipping {} ({} queued)", self.0, queue_len);
//!             return;
//!         }
//!         println!("handling {}", self.0);
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new("requests", 2, 8).unwrap();
//! for i in 0..100 {
//!     dispatcher.dispatch(Arc::new(Request(i)));
//! }
//! println!("{}", dispatcher.stats());
//! // dropping the dispatcher joins every worker
//! ```
//!
//! # Logging
//!
//! Lifecycle events (creation, worker spawn, pool growth, shutdown, discarded
//! tasks, task panics) are emitted through [`tracing`]. Install whatever
//! subscriber you like; the crate never installs one itself.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod queue;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder, ShutdownPolicy, MAX_WORKERS};
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use error::{Error, Result};
pub use executor::{task_fn, FnTask, PanicStrategy, Task, WorkerState};
