//! Task execution infrastructure.
//!
//! This module provides the task contract, the worker loop, panic isolation
//! and the elastic pool that owns the worker threads.

pub mod panic_handler;
pub(crate) mod pool;
pub mod task;
pub mod worker;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use task::{task_fn, FnTask, Task};
pub use worker::{WorkerId, WorkerState};
