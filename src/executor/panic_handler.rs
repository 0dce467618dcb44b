use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Error;

/// How a worker reacts when a task panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicStrategy {
    /// Abort the whole process.
    Abort,
    /// Swallow the panic silently and keep the worker alive.
    Isolate,
    /// Log the panic and keep the worker alive.
    #[default]
    LogAndContinue,
}

#[derive(Debug)]
pub struct PanicHandler {
    strategy: PanicStrategy,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(strategy: PanicStrategy) -> Self {
        Self {
            strategy,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Run `f`, containing any panic according to the strategy.
    ///
    /// `context` names the dispatcher in log output.
    pub fn execute<F, R>(&self, context: &str, f: F) -> Result<R, PanicInfo>
    where
        F: FnOnce() -> R,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(result) => Ok(result),
            Err(panic_payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let panic_info = PanicInfo::from_payload(panic_payload);

                match self.strategy {
                    PanicStrategy::Abort => {
                        tracing::error!(
                            dispatcher = %context,
                            message = %panic_info.message,
                            "task panicked, aborting"
                        );
                        std::process::abort();
                    }
                    PanicStrategy::Isolate => {}
                    PanicStrategy::LogAndContinue => {
                        tracing::error!(
                            dispatcher = %context,
                            message = %panic_info.message,
                            "task panicked"
                        );
                    }
                }

                Err(panic_info)
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> PanicStrategy {
        self.strategy
    }
}

impl Default for PanicHandler {
    fn default() -> Self {
        Self::new(PanicStrategy::default())
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub message: String,
}

impl PanicInfo {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { message }
    }
}

impl From<PanicInfo> for Error {
    fn from(info: PanicInfo) -> Self {
        Error::WorkerPanic(info.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_handler_isolate() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute("test", || {
            panic!("test panic");
        });

        let info = result.unwrap_err();
        assert_eq!(info.message, "test panic");
        assert_eq!(handler.panic_count(), 1);
    }

    #[test]
    fn test_panic_handler_success() {
        let handler = PanicHandler::new(PanicStrategy::Isolate);

        let result = handler.execute("test", || 42);

        assert_eq!(result.unwrap(), 42);
        assert_eq!(handler.panic_count(), 0);
    }

    #[test]
    fn test_formatted_payload() {
        let handler = PanicHandler::default();
        let n = 7;

        let info = handler
            .execute("test", || panic!("bad input {}", n))
            .unwrap_err();

        assert_eq!(info.message, "bad input 7");
        assert!(matches!(Error::from(info), Error::WorkerPanic(_)));
    }

    #[test]
    fn test_panic_counter() {
        let handler = PanicHandler::new(PanicStrategy::LogAndContinue);

        for _ in 0..5 {
            let _ = handler.execute("test", || {
                panic!("test");
            });
        }

        assert_eq!(handler.panic_count(), 5);
    }
}
