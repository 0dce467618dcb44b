use crate::error::{Error, Result};
use crate::executor::PanicStrategy;

/// Hard upper bound on the number of workers a single dispatcher may own.
pub const MAX_WORKERS: usize = 1024;

/// What happens to tasks still queued when the dispatcher shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Workers exit as soon as they observe shutdown. Queued tasks are dropped
    /// without being executed.
    #[default]
    Discard,
    /// Workers keep consuming until the queue is empty, then exit.
    Drain,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub initial_workers: usize,
    pub max_workers: usize,
    pub shutdown_policy: ShutdownPolicy,
    pub panic_strategy: PanicStrategy,
    pub pin_workers: bool,
    pub stack_size: Option<usize>,
    pub thread_name_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "dispatcher".to_string(),
            initial_workers: 1,
            max_workers: num_cpus::get().max(1),
            shutdown_policy: ShutdownPolicy::default(),
            panic_strategy: PanicStrategy::default(),
            pin_workers: false,
            stack_size: Some(2 * 1024 * 1024),
            thread_name_prefix: "dispatch-worker".to_string(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Config with the given name and pool bounds, everything else default.
    pub fn with_bounds<S: Into<String>>(name: S, initial_workers: usize, max_workers: usize) -> Self {
        Self {
            name: name.into(),
            initial_workers,
            max_workers,
            ..Self::default()
        }
    }

    /// Strict check. Rejects anything `normalized` would have to correct.
    pub fn validate(&self) -> Result<()> {
        if self.initial_workers == 0 {
            return Err(Error::config("initial_workers must be > 0"));
        }
        if self.max_workers < self.initial_workers {
            return Err(Error::config(format!(
                "max_workers ({}) must be >= initial_workers ({})",
                self.max_workers, self.initial_workers
            )));
        }
        if self.max_workers > MAX_WORKERS {
            return Err(Error::config(format!(
                "max_workers too large (max {})",
                MAX_WORKERS
            )));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }
        if let Some(0) = self.stack_size {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }

    /// Permissive correction of the pool bounds.
    ///
    /// A zero `initial_workers` becomes 1, and a `max_workers` below the
    /// corrected initial count is raised to match it. Both bounds are capped
    /// at [`MAX_WORKERS`]. Every correction is logged at `warn`.
    pub fn normalized(mut self) -> Self {
        if self.initial_workers == 0 {
            tracing::warn!(
                dispatcher = %self.name,
                "initial_workers is 0, using 1"
            );
            self.initial_workers = 1;
        }
        if self.initial_workers > MAX_WORKERS {
            tracing::warn!(
                dispatcher = %self.name,
                requested = self.initial_workers,
                "initial_workers above limit, capping at {}",
                MAX_WORKERS
            );
            self.initial_workers = MAX_WORKERS;
        }
        if self.max_workers < self.initial_workers {
            tracing::warn!(
                dispatcher = %self.name,
                requested = self.max_workers,
                initial = self.initial_workers,
                "max_workers below initial_workers, freezing pool size"
            );
            self.max_workers = self.initial_workers;
        }
        if self.max_workers > MAX_WORKERS {
            tracing::warn!(
                dispatcher = %self.name,
                requested = self.max_workers,
                "max_workers above limit, capping at {}",
                MAX_WORKERS
            );
            self.max_workers = MAX_WORKERS;
        }
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = Config::default().thread_name_prefix;
        }
        if let Some(0) = self.stack_size {
            self.stack_size = None;
        }
        self
    }

    /// Whether the pool can grow past its initial size.
    pub fn is_elastic(&self) -> bool {
        self.max_workers > self.initial_workers
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
    strict: bool,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            strict: false,
        }
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn initial_workers(mut self, n: usize) -> Self {
        self.config.initial_workers = n;
        self
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.config.max_workers = n;
        self
    }

    /// Fixed-size pool: initial and max set to the same value.
    pub fn fixed_workers(mut self, n: usize) -> Self {
        self.config.initial_workers = n;
        self.config.max_workers = n;
        self
    }

    pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.config.shutdown_policy = policy;
        self
    }

    pub fn panic_strategy(mut self, strategy: PanicStrategy) -> Self {
        self.config.panic_strategy = strategy;
        self
    }

    pub fn pin_workers(mut self, pin: bool) -> Self {
        self.config.pin_workers = pin;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Reject out-of-range bounds instead of correcting them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> Result<Config> {
        if self.strict {
            self.config.validate()?;
            return Ok(self.config);
        }

        if self.config.max_workers > MAX_WORKERS {
            return Err(Error::config(format!(
                "max_workers too large (max {})",
                MAX_WORKERS
            )));
        }
        if self.config.thread_name_prefix.is_empty() {
            return Err(Error::config("thread_name_prefix must not be empty"));
        }

        Ok(self.config.normalized())
    }
}
