//! Logging for the MVC pipeline.
//!
//! Everything logs through `tracing`. Applications call [`LogConfig::init`]
//! once at startup; libraries embedding the pipeline can skip it and install
//! their own subscriber.
//!
//! ```no_run
//! use armature_mvc_core::logging::*;
//!
//! LogConfig::new()
//!     .level(LogLevel::Debug)
//!     .format(LogFormat::Compact)
//!     .init();
//!
//! info!("MVC pipeline ready");
//! ```
//!
//! The [`pipeline`] submodule holds the named events the invoker emits at
//! each stage transition so that log lines stay uniform across stages.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing for convenience
pub use tracing::{debug, error, info, trace, warn};

/// Log level for filtering messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to string for EnvFilter
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Output format for log messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Structured, machine-readable (default)
    Json,
    /// Simple human-readable lines
    Plain,
    /// Multi-line, for development
    Pretty,
    /// Minimal single-line output
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub stderr: bool,
    pub targets: bool,
    pub env_filter: Option<String>,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Write to STDERR instead of STDOUT.
    pub fn stderr(mut self, enable: bool) -> Self {
        self.stderr = enable;
        self
    }

    pub fn with_targets(mut self, enable: bool) -> Self {
        self.targets = enable;
        self
    }

    /// Use an explicit filter directive such as `armature_mvc_core=trace`.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    fn build_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str())),
            None => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str())),
        }
    }

    /// Install the global subscriber.
    ///
    /// Returns `false` when a subscriber was already installed, which is the
    /// normal case in test binaries.
    pub fn init(self) -> bool {
        let filter = self.build_filter();
        let registry = tracing_subscriber::registry().with(filter);

        macro_rules! install {
            ($layer:expr) => {
                if self.stderr {
                    registry
                        .with($layer.with_writer(std::io::stderr))
                        .try_init()
                        .is_ok()
                } else {
                    registry
                        .with($layer.with_writer(std::io::stdout))
                        .try_init()
                        .is_ok()
                }
            };
        }

        match self.format {
            LogFormat::Json => install!(fmt::layer().json().with_target(self.targets)),
            LogFormat::Plain => install!(fmt::layer().with_ansi(false).with_target(self.targets)),
            LogFormat::Pretty => install!(fmt::layer().pretty().with_target(self.targets)),
            LogFormat::Compact => install!(fmt::layer().compact().with_target(self.targets)),
        }
    }
}

impl Default for LogConfig {
    /// JSON to STDOUT at INFO level
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            stderr: false,
            targets: true,
            env_filter: None,
        }
    }
}

/// Named log events for pipeline transitions.
pub mod pipeline {
    use super::{debug, error, info, trace, warn};
    use std::time::Duration;

    const TARGET: &str = "armature_mvc::pipeline";

    pub fn executing_action(action: &str, trace_id: &str) {
        info!(target: TARGET, action, trace_id, "Executing action");
    }

    pub fn executed_action(action: &str, status: u16, elapsed: Duration) {
        info!(
            target: TARGET,
            action,
            status,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Executed action"
        );
    }

    pub fn filter_execution_plan(action: &str, stage: &str, filters: &[&str]) {
        debug!(target: TARGET, action, stage, filters = ?filters, "Execution plan");
    }

    pub fn before_filter(stage: &str, hook: &str, filter: &str) {
        trace!(target: TARGET, stage, hook, filter, "Before executing filter hook");
    }

    pub fn after_filter(stage: &str, hook: &str, filter: &str) {
        trace!(target: TARGET, stage, hook, filter, "After executing filter hook");
    }

    pub fn short_circuited(stage: &str, filter: &str) {
        debug!(
            target: TARGET,
            stage,
            filter,
            "Request was short circuited at {} filter '{}'",
            stage,
            filter
        );
    }

    pub fn authorization_failure(filter: &str) {
        info!(
            target: TARGET,
            filter,
            "Authorization failed for the request at filter '{}'",
            filter
        );
    }

    pub fn skipped_policy(filter: &str, policy: &str) {
        trace!(target: TARGET, filter, policy, "Skipping non-effective policy filter");
    }

    pub fn executing_method(action: &str, arguments: usize) {
        debug!(target: TARGET, action, arguments, "Executing action method");
    }

    pub fn executed_method(action: &str, outcome: &str, elapsed: Duration) {
        debug!(
            target: TARGET,
            action,
            outcome,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Executed action method"
        );
    }

    pub fn exception_filter_handled(filter: &str, kind: &str) {
        warn!(target: TARGET, filter, error_kind = kind, "Exception handled by exception filter");
    }

    pub fn unhandled_exception(action: &str, kind: &str, message: &str) {
        error!(target: TARGET, action, error_kind = kind, message, "Unhandled exception in action pipeline");
    }

    pub fn executing_result(result: &str) {
        debug!(target: TARGET, result, "Executing action result");
    }

    pub fn no_formatter(content_types: &str) {
        warn!(
            target: TARGET,
            content_types,
            "No output formatter was found for content types '{}' to write the response",
            content_types
        );
    }

    pub fn formatter_selected(formatter: &str, content_type: &str) {
        debug!(target: TARGET, formatter, content_type, "Selected output formatter");
    }

    pub fn ignored_accept_header() {
        debug!(target: TARGET, "Ignoring Accept header because it contains a wildcard media type");
    }

    pub fn diagnostic_listener_panicked(event: &str) {
        warn!(target: TARGET, event, "Diagnostic listener panicked; event dropped");
    }
}
