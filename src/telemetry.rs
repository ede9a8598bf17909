//! Telemetry utilities for dispatch timing and tracing spans.

use std::time::Instant;

/// Guard for timing one dispatched line.
///
/// Records latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span for the uplink connection.
    pub fn link(numeric: &str, name: &str) -> Span {
        info_span!("link", numeric = %numeric, name = %name)
    }

    /// Span for one dispatched line.
    pub fn command(name: &str, source: Option<&str>) -> Span {
        match source {
            Some(source) => info_span!("command", name = %name, source = %source),
            None => info_span!("command", name = %name),
        }
    }
}
