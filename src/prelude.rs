pub use crate::config::{Config, ConfigBuilder, ShutdownPolicy};
pub use crate::dispatcher::{Dispatcher, DispatcherStats};
pub use crate::error::{Error, Result};
pub use crate::executor::{task_fn, FnTask, PanicStrategy, Task, WorkerState};
pub use crate::telemetry::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{JsonExporter, LogExporter, MetricsExporter};
