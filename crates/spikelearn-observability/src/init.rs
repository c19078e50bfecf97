// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Installs a console layer and, with the `file-logging` feature, a rolling
//! file layer inside a timestamped run folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── spikelearn.log
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::LogOptions;
#[cfg(feature = "file-logging")]
use crate::config::LogFormat;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving log files, if file output is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Initialize the global subscriber
///
/// # Errors
/// Fails if the run folder cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LogOptions) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&options.level);
    let env_filter = EnvFilter::try_new(&filter)
        .with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter)
        .boxed();
    layers.push(console_layer);

    let run_folder = prepare_run_folder(options)?;

    #[cfg(feature = "file-logging")]
    let file_guards = match &run_folder {
        Some(run_folder) => attach_file_layer(&mut layers, run_folder, &filter, options.format)?,
        None => Vec::new(),
    };

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Create this run's folder and prune old runs
#[cfg(feature = "file-logging")]
fn prepare_run_folder(options: &LogOptions) -> Result<Option<PathBuf>> {
    let Some(base_log_dir) = &options.log_dir else {
        return Ok(None);
    };
    let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
    let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    cleanup_old_logs(base_log_dir, options.retention_days, options.retention_runs)?;
    Ok(Some(run_folder))
}

/// Without file output a `log_dir` is ignored; nothing is created on disk
#[cfg(not(feature = "file-logging"))]
fn prepare_run_folder(options: &LogOptions) -> Result<Option<PathBuf>> {
    if let Some(base_log_dir) = &options.log_dir {
        tracing::warn!(
            "log_dir {} ignored: built without the file-logging feature",
            base_log_dir.display()
        );
    }
    Ok(None)
}

#[cfg(feature = "file-logging")]
fn attach_file_layer(
    layers: &mut Vec<Box<dyn Layer<Registry> + Send + Sync>>,
    run_folder: &Path,
    filter: &str,
    format: LogFormat,
) -> Result<Vec<tracing_appender::non_blocking::WorkerGuard>> {
    let appender = tracing_appender::rolling::daily(run_folder, "spikelearn.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let file_filter =
        EnvFilter::try_new(filter).with_context(|| format!("Invalid log filter: {}", filter))?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);
    let file_layer = match format {
        LogFormat::Json => file_layer.json().with_filter(file_filter).boxed(),
        LogFormat::Text => file_layer.with_filter(file_filter).boxed(),
    };
    layers.push(file_layer);

    Ok(vec![guard])
}

/// Initialize console logging at `info` plus any debug flags
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LogOptions::default())
}

/// Remove run folders older than `retention_days`, then trim to the
/// `retention_runs` most recent.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<()> {
    if !base_log_dir.exists() {
        return Ok(());
    }

    let cutoff_date = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| name.strip_prefix(RUN_PREFIX))
            .and_then(|ts| NaiveDateTime::parse_from_str(ts, RUN_TIMESTAMP_FORMAT).ok());
        if let Some(started) = started {
            runs.push((path, started.and_utc()));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, dt)| *dt);

    let mut kept = Vec::new();
    for (path, dt) in runs {
        if dt < cutoff_date {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                tracing::warn!("Failed to remove old log directory {}: {}", path.display(), e);
            }
        } else {
            kept.push(path);
        }
    }

    if kept.len() > retention_runs {
        let to_remove = kept.len() - retention_runs;
        for path in kept.iter().take(to_remove) {
            if let Err(e) = std::fs::remove_dir_all(path) {
                tracing::warn!("Failed to remove old log directory {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}
