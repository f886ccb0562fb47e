//! Logging setup for the `unload` binary
//!
//! Console output goes to stderr so stdout only carries the completion
//! message. With a log directory configured, a daily-rotated JSON log is
//! written as well.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "warn,unload_cli=info,unload_core=info,unload_driver_sqlite=info,unload_interchange=info";
const VERBOSE_FILTER: &str = "info,unload_cli=debug,unload_core=debug,unload_driver_sqlite=debug,unload_interchange=debug";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files; no file output when unset
    pub log_dir: Option<PathBuf>,

    /// Whether to log to stderr
    pub enable_console_logs: bool,

    /// Filter used when RUST_LOG is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            enable_console_logs: true,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn verbose() -> Self {
        Self {
            default_filter: VERBOSE_FILTER.to_string(),
            ..Self::default()
        }
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        if let Some(filter) = filter {
            self.default_filter = filter;
        }
        self
    }

    /// RUST_LOG takes precedence over the configured filter
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file log on drop and must be held until exit.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = config.env_filter();
    let mut layers = Vec::new();
    let mut guard = None;

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    if let Some(ref log_dir) = config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "unload.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = ?config.log_dir,
        console_enabled = config.enable_console_logs,
        "Logging system initialized"
    );

    Ok(guard)
}
