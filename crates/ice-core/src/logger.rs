//! Pluggable logger used by the runtime for user-visible diagnostics.
//!
//! The runtime's own debug chatter goes straight to `tracing`. Messages that
//! belong to the application (the leak warning, adapter tracing) go through
//! the instance's [`Logger`], which the application can replace at runtime.

/// Sink for runtime diagnostics.
pub trait Logger: Send + Sync {
    /// Print a message verbatim.
    fn print(&self, message: &str);

    /// Log a trace message under a category.
    fn trace(&self, category: &str, message: &str);

    fn warning(&self, message: &str);

    fn error(&self, message: &str);
}

/// Default logger forwarding to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingLogger {
    prefix: String,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger whose messages are tagged with a program name.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Logger for TracingLogger {
    fn print(&self, message: &str) {
        tracing::info!(program = %self.prefix, "{}", message);
    }

    fn trace(&self, category: &str, message: &str) {
        tracing::debug!(program = %self.prefix, category, "{}", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!(program = %self.prefix, "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(program = %self.prefix, "{}", message);
    }
}
