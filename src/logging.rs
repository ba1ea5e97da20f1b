use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const CATEGORY_GENERAL: &str = "General";
pub const CATEGORY_COMPILER: &str = "Compiler";
pub const CATEGORY_ERROR: &str = "Error";

/// Event ids carried by [`LogEntry::event_id`].
pub mod event_ids {
    pub const COMPILER_OUTPUT: i32 = 90;
    pub const COMPILER_ERROR_OUTPUT: i32 = 91;
    pub const RUN_STARTED: i32 = 30000;
    pub const RUN_FINISHED: i32 = 30001;
    pub const FILE_STARTED: i32 = 30002;
    pub const FILE_SUCCEEDED: i32 = 30003;
    pub const TARGET_NOT_FOUND: i32 = 30100;
    pub const WORKER_FAILURE: i32 = 30101;
    pub const FILE_FAILED: i32 = 30102;
    pub const COMPILER_DIAGNOSTIC: i32 = 30103;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

/// A leveled, categorized message for a [`LogSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub message: String,
    pub categories: Vec<&'static str>,
    pub event_id: i32,
    pub title: String,
    pub severity: Severity,
}

impl LogEntry {
    pub fn new(event_id: i32, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            categories: vec![CATEGORY_COMPILER],
            event_id,
            title: title.into(),
            severity: Severity::Information,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_categories(mut self, categories: &[&'static str]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    /// Tag the entry as `{"Compiler", "Error"}`.
    pub fn as_error(self) -> Self {
        self.with_categories(&[CATEGORY_COMPILER, CATEGORY_ERROR])
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| *c == category)
    }
}

/// Destination for structured log entries.
///
/// Shared by every worker of a run, so implementations must be thread-safe.
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send + Sync {
    fn write(&self, entry: LogEntry);
}

/// Forwards entries to `tracing`, one event per entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write(&self, entry: LogEntry) {
        let categories = entry.categories.join(",");
        match entry.severity {
            Severity::Information => tracing::info!(
                event_id = entry.event_id,
                title = %entry.title,
                categories = %categories,
                "{}",
                entry.message
            ),
            Severity::Warning => tracing::warn!(
                event_id = entry.event_id,
                title = %entry.title,
                categories = %categories,
                "{}",
                entry.message
            ),
            Severity::Error => tracing::error!(
                event_id = entry.event_id,
                title = %entry.title,
                categories = %categories,
                "{}",
                entry.message
            ),
        }
    }
}

fn ensure_log_dir(log_dir: &str) -> Result<()> {
    let log_path = Utf8PathBuf::from(log_dir);
    if !log_path.exists() {
        fs::create_dir_all(&log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}

fn level_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Setup logging with rotating file appender.
///
/// Logs are written to the specified directory with daily rotation. `RUST_LOG`
/// overrides the level picked from `debug_mode`.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    setup_logging_with_console(log_dir, log_prefix, debug_mode, false)
}

/// Setup logging with optional console output.
///
/// # Arguments
/// * `log_dir` - Directory for log files
/// * `log_prefix` - Prefix for log files
/// * `debug_mode` - If true, use debug level; otherwise use info level
/// * `console_output` - If true, also log to console
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging_with_console(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    ensure_log_dir(log_dir)?;

    let file_appender = rolling::daily(log_dir, log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Option<Layer> is itself a layer, so the console output can be switched off in place
    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(level_filter(debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        log_dir,
        log_prefix,
        debug_mode,
        console_output
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_setup_logging_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let log_dir_str = log_dir.to_str().unwrap();

        // A second global subscriber in the same test binary fails to install,
        // but the directory is created before that happens
        let _ = setup_logging(log_dir_str, "test", false);

        assert!(log_dir.exists());
    }

    #[test]
    fn test_log_entry_builders() {
        let entry = LogEntry::new(event_ids::FILE_FAILED, "Failed file compilation", "Foo.psc")
            .with_severity(Severity::Warning)
            .as_error();

        assert_eq!(entry.event_id, 30102);
        assert_eq!(entry.severity, Severity::Warning);
        assert!(entry.has_category(CATEGORY_COMPILER));
        assert!(entry.has_category(CATEGORY_ERROR));
        assert!(!entry.has_category(CATEGORY_GENERAL));
    }

    #[test]
    fn test_tracing_sink_accepts_all_severities() {
        let sink = TracingLogSink;
        for severity in [Severity::Information, Severity::Warning, Severity::Error] {
            sink.write(LogEntry::new(event_ids::COMPILER_OUTPUT, "", "line").with_severity(severity));
        }
    }
}
