//! Logging and output control
//!
//! This module provides the [`Logger`] handed to every registry component. Leveled
//! messages are forwarded to [`tracing`]; with no subscriber installed the library
//! stays silent. The presentation helpers used by the command-line tool write to
//! stderr so that manifests on stdout stay machine-readable.

use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Target used for every event emitted by this crate
pub const LOG_TARGET: &str = "docker_manifest_client";

/// Logger responsible for all diagnostic and user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    // Leveled diagnostics
    pub fn debug(&self, message: &str) {
        tracing::debug!(target: LOG_TARGET, "{}", message);
    }

    pub fn info(&self, message: &str) {
        tracing::info!(target: LOG_TARGET, "{}", message);
    }

    pub fn warning(&self, message: &str) {
        tracing::warn!(target: LOG_TARGET, "{}", message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!(target: LOG_TARGET, "{}", message);
    }

    /// Debug message that is only emitted in verbose mode
    pub fn verbose(&self, message: &str) {
        if self.verbose {
            tracing::debug!(target: LOG_TARGET, "{}", message);
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose {
            tracing::trace!(target: LOG_TARGET, "{}", message);
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            eprintln!("\n=== {} ===", title);
        }
    }

    /// Plain status line for the user
    pub fn status(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message);
        }
    }

    /// Key-value pair summary display
    pub fn summary_kv(&self, title: &str, items: &[(&str, String)]) {
        if !self.quiet {
            eprintln!("\n--- {} ---", title);
            for (key, value) in items {
                eprintln!("  {}: {}", key, value);
            }
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{:.2}s", duration.as_secs_f64())
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}

/// Install a stderr `tracing` subscriber for the command-line tool.
///
/// `RUST_LOG` wins when set; otherwise verbosity picks the default filter.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "docker_manifest_client=trace,info"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        let logger = Logger::new_quiet();
        assert_eq!(logger.format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(logger.format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(logger.format_duration(Duration::from_secs(3725)), "1h2m5s");
    }
}
