use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// How the diagnostic log is written.
///
/// Diagnostics are separate from the run log kept in
/// [`RunState`](crate::models::RunState): they go to a daily rotating file
/// and optionally to the console.
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Directory for log files (e.g., "logs")
    pub log_dir: &'a str,
    /// Prefix for log files (e.g., "autotest")
    pub log_prefix: &'a str,
    /// Debug level instead of info
    pub debug_mode: bool,
    /// Also log to stderr
    pub console_output: bool,
    /// Write the file log as JSON lines
    pub json_file: bool,
}

impl Default for LogOptions<'_> {
    fn default() -> Self {
        Self {
            log_dir: "logs",
            log_prefix: "autotest",
            debug_mode: false,
            console_output: false,
            json_file: false,
        }
    }
}

/// Build the level filter. `RUST_LOG` wins over `debug_mode` when set.
fn build_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

fn ensure_log_dir(log_dir: &str) -> Result<()> {
    let log_path = Utf8Path::new(log_dir);
    if !log_path.exists() {
        fs::create_dir_all(log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}

/// Setup logging with a rotating file appender and optional console output.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active.
/// Fails if a global subscriber is already installed.
pub fn setup_logging_with_console(options: &LogOptions<'_>) -> Result<WorkerGuard> {
    ensure_log_dir(options.log_dir)?;

    let file_appender = rolling::daily(options.log_dir, options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = if options.json_file {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let console_layer = options.console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(build_filter(options.debug_mode))
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.log_dir,
        options.log_prefix,
        options.debug_mode,
        options.console_output,
        options.json_file
    );

    Ok(guard)
}

/// Setup file-only logging.
pub fn setup_logging(log_dir: &str, log_prefix: &str, debug_mode: bool) -> Result<WorkerGuard> {
    setup_logging_with_console(&LogOptions {
        log_dir,
        log_prefix,
        debug_mode,
        ..Default::default()
    })
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

        // May fail if another test already installed a global subscriber,
        // but the directory is created first either way
        let _ = setup_logging(log_dir_str, "test", false);

        assert!(log_dir.exists());
    }

    #[test]
    fn test_ensure_log_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("nested").join("logs");
        let log_dir_str = log_dir.to_str().unwrap();

        ensure_log_dir(log_dir_str).unwrap();
        ensure_log_dir(log_dir_str).unwrap();
        assert!(log_dir.is_dir());
    }

    #[test]
    fn test_default_options() {
        let options = LogOptions::default();
        assert_eq!(options.log_dir, "logs");
        assert_eq!(options.log_prefix, "autotest");
        assert!(!options.console_output);
    }
}
