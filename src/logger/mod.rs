//! Logger collaborator used by the connection handler.
//!
//! The handler reports its per-connection events through this trait so the
//! exact sequence of entries can be observed. [`TracingLogger`] is the default.

/// Three-level logger
pub trait SyncLogger: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str);

    fn debug(&self, message: &str);
}

/// Forwards to `tracing` at the matching level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl SyncLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "model_sync::connection", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "model_sync::connection", "{}", message);
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "model_sync::connection", "{}", message);
    }
}
