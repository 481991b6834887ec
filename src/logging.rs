use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Keeps the file writer alive and allows switching the log level after settings load.
///
/// Must be held for the duration of the program; dropping it flushes and closes the
/// transcript.
pub struct LoggingHandle {
    log_file: Utf8PathBuf,
    filter: reload::Handle<EnvFilter, Registry>,
    _guard: WorkerGuard,
}

impl LoggingHandle {
    /// Path of this run's transcript
    pub fn log_file(&self) -> &Utf8Path {
        &self.log_file
    }

    /// Switch between `debug` (verbose) and `info` level
    pub fn set_verbose(&self, verbose: bool) -> Result<()> {
        self.filter
            .reload(level_filter(verbose))
            .context("Failed to change the log level")?;
        tracing::debug!("Verbose logging enabled");
        Ok(())
    }
}

fn level_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    }
}

/// Name of the transcript for a run started at `timestamp` (`<prefix>_<YYYYMMDD_HHMMSS>.log`)
pub fn log_file_name(prefix: &str, timestamp: chrono::DateTime<chrono::Local>) -> String {
    format!("{}_{}.log", prefix, timestamp.format("%Y%m%d_%H%M%S"))
}

/// Setup logging with one transcript file per run and optional console output.
///
/// # Arguments
/// * `log_dir` - Directory for log files (e.g., "logs"), created if missing
/// * `log_prefix` - Prefix for log files (e.g., "mappacker")
/// * `console_output` - If true, also log to the console with colors
///
/// # Returns
/// A handle that must be held for the duration of the program to keep logging active
pub fn setup_logging(
    log_dir: &Utf8Path,
    log_prefix: &str,
    console_output: bool,
) -> Result<LoggingHandle> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }

    let file_name = log_file_name(log_prefix, chrono::Local::now());
    let log_file = log_dir.join(&file_name);

    let file_appender = rolling::never(log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (filter, filter_handle) = reload::Layer::new(level_filter(false));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .without_time()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the logging subscriber")?;

    tracing::debug!(
        "Logging initialized: file={}, console={}",
        log_file,
        console_output
    );

    Ok(LoggingHandle {
        log_file,
        filter: filter_handle,
        _guard: guard,
    })
}
