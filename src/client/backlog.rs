//! Observers notified when a message could not be delivered.
//!
//! Backlog handlers see every message that exhausted its retries, along with
//! the reason. They are best-effort: a handler that panics is logged and
//! skipped, and the remaining handlers still run.

use std::{fmt, sync::Arc};

use crate::{panic::run_contained, priority::Severity};

/// Receives messages whose delivery failed.
pub trait BackLogHandler: Send + Sync {
    /// Called once per undeliverable message.
    fn log(&self, severity: Severity, message: &str, reason: &str);

    /// Called once when the owning client starts.
    fn initialize(&self) {}

    /// Called once when the owning client shuts down.
    fn destroy(&self) {}
}

/// Discards undeliverable messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackLogHandler;

impl BackLogHandler for NullBackLogHandler {
    fn log(&self, _severity: Severity, _message: &str, _reason: &str) {}
}

/// Reports undeliverable messages through `tracing` at `warn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingBackLogHandler;

impl BackLogHandler for TracingBackLogHandler {
    fn log(&self, severity: Severity, message: &str, reason: &str) {
        tracing::warn!(%severity, reason, message, "syslog message not delivered");
    }
}

/// Forwards undeliverable messages to a closure.
pub struct CallbackBackLogHandler<F>(F);

impl<F> CallbackBackLogHandler<F>
where
    F: Fn(Severity, &str, &str) + Send + Sync,
{
    pub fn new(callback: F) -> Self { Self(callback) }
}

impl<F> BackLogHandler for CallbackBackLogHandler<F>
where
    F: Fn(Severity, &str, &str) + Send + Sync,
{
    fn log(&self, severity: Severity, message: &str, reason: &str) { (self.0)(severity, message, reason); }
}

impl<F> fmt::Debug for CallbackBackLogHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("CallbackBackLogHandler") }
}

/// Ordered set of backlog handlers; a panicking handler does not stop the
/// rest.
#[derive(Clone, Default)]
pub struct BackLogChain {
    handlers: Vec<Arc<dyn BackLogHandler>>,
}

impl BackLogChain {
    pub fn push(&mut self, handler: Arc<dyn BackLogHandler>) { self.handlers.push(handler); }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    pub fn initialize(&self) { self.each("initialize", |handler| handler.initialize()); }

    pub fn destroy(&self) { self.each("destroy", |handler| handler.destroy()); }

    pub fn log(&self, severity: Severity, message: &str, reason: &str) {
        self.each("log", |handler| handler.log(severity, message, reason));
    }

    fn each(&self, callback: &'static str, f: impl Fn(&dyn BackLogHandler)) {
        for handler in &self.handlers {
            if let Err(panic) = run_contained(|| f(handler.as_ref())) {
                tracing::debug!(callback, panic = %panic, "backlog handler panicked");
            }
        }
    }
}

impl fmt::Debug for BackLogChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackLogChain")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
