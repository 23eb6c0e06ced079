//! Tracing configuration for the command-line front end
//!
//! The library only emits events and spans; installing a subscriber is left to
//! the binary, which does so through [`TracingConfig`].

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    Console,
    /// Compact console output without colors for CI logs
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Configuration for tracing output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Output to stderr (default)
    Console,
    /// Output to a file
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
    /// Output to both console and a daily rolling file
    #[cfg(feature = "tracing-files")]
    Both(std::path::PathBuf),
}

/// Keeps background log writers alive; drop it only when the program exits
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    /// Output format
    pub format: TracingFormat,
    /// Output destination
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlating a run's events
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-2+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    /// Set a custom filter directive such as `imgly_bgstudio=debug,reqwest=warn`
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    fn build_filter(&self) -> anyhow::Result<EnvFilter> {
        let filter = match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)?,
            None => match EnvFilter::try_from_default_env() {
                Ok(from_env) if self.verbosity == 0 => from_env,
                _ => EnvFilter::try_new(self.verbosity_to_filter())?,
            },
        };
        Ok(filter)
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        use tracing_subscriber::fmt;

        let registry = Registry::default().with(self.build_filter()?);
        #[allow(unused_mut)]
        let mut guard = TracingGuard::default();

        match (&self.format, &self.output) {
            (TracingFormat::Console, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },

            (TracingFormat::Compact, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(false)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },

            #[cfg(feature = "tracing-json")]
            (TracingFormat::Json, TracingOutput::Console) => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },

            #[cfg(feature = "tracing-files")]
            (format, TracingOutput::File(path)) => {
                use tracing_appender::{non_blocking, rolling};

                let file_appender = rolling::never(
                    path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    path.file_name()
                        .unwrap_or_else(|| std::ffi::OsStr::new("bgstudio.log")),
                );
                let (file_writer, file_guard) = non_blocking(file_appender);
                guard._file_guard = Some(file_guard);

                match format {
                    TracingFormat::Console | TracingFormat::Compact => {
                        let fmt_layer =
                            fmt::layer().with_ansi(false).with_writer(file_writer).compact();
                        registry.with(fmt_layer).try_init()?;
                    },
                    #[cfg(feature = "tracing-json")]
                    TracingFormat::Json => {
                        let fmt_layer = fmt::layer()
                            .json()
                            .with_writer(file_writer)
                            .with_current_span(true)
                            .with_span_list(true);
                        registry.with(fmt_layer).try_init()?;
                    },
                }
            },

            #[cfg(feature = "tracing-files")]
            (format, TracingOutput::Both(path)) => {
                use tracing_appender::{non_blocking, rolling};

                let file_appender = rolling::daily(
                    path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    path.file_stem()
                        .unwrap_or_else(|| std::ffi::OsStr::new("bgstudio")),
                );
                let (file_writer, file_guard) = non_blocking(file_appender);
                guard._file_guard = Some(file_guard);

                let file_layer = fmt::layer().with_ansi(false).with_writer(file_writer).compact();
                let console_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(*format == TracingFormat::Console)
                    .with_target(false)
                    .compact();

                registry.with(console_layer).with(file_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(session_id = %session_id, "🚀 Session started");
        }

        Ok(guard)
    }
}

/// Initialize tracing with CLI-friendly defaults
///
/// # Errors
/// - Subscriber could not be installed
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<TracingGuard> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span for an entire CLI invocation
    pub fn session(command: &str, api_url: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "session",
            command = %command,
            api_url = %api_url
        )
    }

    /// Span for one background removal round trip
    pub fn removal(file_name: &str, model: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "removal",
            file_name = %file_name,
            model = %model
        )
    }

    /// Span for compositing and encoding a result
    pub fn compose(dimensions: (u32, u32), format: &str) -> Span {
        tracing::span!(
            Level::DEBUG,
            "compose",
            width = %dimensions.0,
            height = %dimensions.1,
            format = %format
        )
    }

    /// Span for a batch run
    pub fn batch_processing(file_count: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "batch_processing",
            file_count = %file_count
        )
    }

    /// Span for reference store maintenance
    pub fn store_operation(operation: &str, path: &std::path::Path) -> Span {
        tracing::span!(
            Level::DEBUG,
            "store_operation",
            operation = %operation,
            path = %path.display()
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use tracing::{debug, error, info, warn};

    /// Log a user-facing progress update
    pub fn progress(message: &str, emoji: &str) {
        info!("{} {}", emoji, message);
    }

    /// Log an error with context
    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!(
            error = %error,
            context = %context,
            "❌ Operation failed"
        );
    }

    /// Log a warning with recommendation
    pub fn warning_with_recommendation(message: &str, recommendation: &str) {
        warn!(
            message = %message,
            recommendation = %recommendation,
            "⚠️  Warning"
        );
    }

    /// Log how long an operation took
    pub fn performance_metric(operation: &str, duration_ms: u64) {
        debug!(
            operation = %operation,
            duration_ms = %duration_ms,
            "⏱️  Performance metric"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().with_verbosity(0).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "trace");
        assert_eq!(TracingConfig::new().with_verbosity(10).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_env_filter("imgly_bgstudio=debug")
            .with_session_id("test-session");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter.as_deref(), Some("imgly_bgstudio=debug"));
        assert_eq!(config.session_id.as_deref(), Some("test-session"));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = TracingConfig::new().with_env_filter("imgly_bgstudio=verbose");
        assert!(config.build_filter().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.format, TracingFormat::Console);
        assert_eq!(config.output, TracingOutput::Console);
        assert!(config.env_filter.is_none());
    }
}
