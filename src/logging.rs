//! Logging setup for tweetstore.
//!
//! Everything logs through `tracing`; this module only decides where the
//! events go and how they look. `RUST_LOG` overrides the configured level.
//!
//! # Usage
//!
//! ```rust
//! use tweetstore::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default());
//! tracing::info!("Ingest started");
//! ```

use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum level shown for tweetstore's own events.
    pub level: LogLevel,
    /// Output format for log messages.
    pub format: LogFormat,
    /// Enable ANSI colors in output.
    pub colors: bool,
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Info,
    Debug,
    Trace,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, no timestamp or target.
    Compact,
    /// Multi-line events with timestamp, target and source location.
    Pretty,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            colors: true,
        }
    }
}

impl LogConfig {
    /// Errors only, for `-q`.
    #[must_use]
    pub const fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            colors: true,
        }
    }

    /// Debug level, for `-v`.
    #[must_use]
    pub const fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            colors: true,
        }
    }

    /// Every event, for `-vv` and above.
    #[must_use]
    pub const fn trace() -> Self {
        Self {
            level: LogLevel::Trace,
            format: LogFormat::Pretty,
            colors: true,
        }
    }

    /// Pick a preset from the global `-q` flag and the `-v` count.
    /// `-q` wins over any number of `-v`.
    #[must_use]
    pub const fn for_cli(quiet: bool, verbosity: u8) -> Self {
        if quiet {
            return Self::quiet();
        }
        match verbosity {
            0 => Self {
                level: LogLevel::Info,
                format: LogFormat::Compact,
                colors: true,
            },
            1 => Self::verbose(),
            _ => Self::trace(),
        }
    }

    /// Same preset with colors switched on or off.
    #[must_use]
    pub const fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    fn filter_directive(self) -> String {
        let level = match self.level {
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        format!("tweetstore={level}")
    }
}

/// Install the global subscriber. Later calls are ignored.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging(config: &LogConfig) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(config.filter_directive())
    };

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.colors);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Compact => base
            .compact()
            .without_time()
            .with_target(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => base
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init().ok();
}

/// Initialize logging from the global `-q` / `-v` flags.
pub fn init_cli_logging(quiet: bool, verbosity: u8, colors: bool) {
    init_logging(&LogConfig::for_cli(quiet, verbosity).with_colors(colors));
}

/// Logs the start and end of an operation with its duration.
pub struct OperationGuard {
    name: String,
    start: std::time::Instant,
}

impl OperationGuard {
    /// Start tracking an operation.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::debug!(operation = %name, "Starting operation");
        Self {
            name,
            start: std::time::Instant::now(),
        }
    }

    /// Complete the operation successfully.
    pub fn complete(self) {
        let duration = self.start.elapsed();
        tracing::info!(
            operation = %self.name,
            duration_ms = duration.as_millis(),
            "Operation completed"
        );
    }

    /// Mark the operation as failed.
    pub fn fail(self, error: &dyn std::error::Error) {
        let duration = self.start.elapsed();
        tracing::error!(
            operation = %self.name,
            duration_ms = duration.as_millis(),
            error = %error,
            "Operation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags_pick_preset() {
        assert_eq!(LogConfig::for_cli(false, 0), LogConfig::default());
        assert_eq!(LogConfig::for_cli(false, 1), LogConfig::verbose());
        assert_eq!(LogConfig::for_cli(false, 2).level, LogLevel::Trace);
        assert_eq!(LogConfig::for_cli(false, 5), LogConfig::trace());
        assert_eq!(LogConfig::for_cli(true, 2), LogConfig::quiet());
    }

    #[test]
    fn test_filter_directive_scopes_to_crate() {
        assert_eq!(LogConfig::quiet().filter_directive(), "tweetstore=error");
        assert_eq!(LogConfig::default().filter_directive(), "tweetstore=info");
        assert_eq!(LogConfig::trace().filter_directive(), "tweetstore=trace");
    }

    #[test]
    fn test_with_colors() {
        assert!(!LogConfig::verbose().with_colors(false).colors);
        assert_eq!(LogConfig::verbose().with_colors(false).level, LogLevel::Debug);
    }
}
