//! Diagnostic sink for human-readable application messages.

use log::{error, info};

/// Log target used by [`LogSink`], separate from the crate's internal logs.
pub const APP_LOG_TARGET: &str = "whisper_relay::app";

/// Receives the relay's application-level notices.
///
/// Purely informational: nothing written here feeds back into control flow.
#[cfg_attr(test, mockall::automock)]
pub trait DiagnosticSink: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sink backed by the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn info(&self, message: &str) {
        info!(target: APP_LOG_TARGET, "{}", message);
    }

    fn error(&self, message: &str) {
        error!(target: APP_LOG_TARGET, "{}", message);
    }
}
