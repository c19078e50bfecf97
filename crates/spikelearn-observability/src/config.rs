//! Observability configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log format for file output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogFormat {
    Text,
    #[default]
    Json,
}

impl From<spikelearn_config::LogFileFormat> for LogFormat {
    fn from(format: spikelearn_config::LogFileFormat) -> Self {
        match format {
            spikelearn_config::LogFileFormat::Text => LogFormat::Text,
            spikelearn_config::LogFileFormat::Json => LogFormat::Json,
        }
    }
}

/// Runtime logging options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogOptions {
    /// Base level for everything not raised by a debug flag
    pub level: String,

    /// Format of the file layer (console is always text)
    pub format: LogFormat,

    /// Base directory for run folders; no file output when `None`
    pub log_dir: Option<PathBuf>,

    /// Keep run folders for N days
    pub retention_days: u64,

    /// Keep the N most recent run folders
    pub retention_runs: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            level: "info".to_string(),
            format: LogFormat::default(),
            log_dir: None,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

impl From<&spikelearn_config::LoggingConfig> for LogOptions {
    fn from(config: &spikelearn_config::LoggingConfig) -> Self {
        LogOptions {
            level: config.level.clone(),
            format: config.format.into(),
            log_dir: config.log_dir.clone(),
            retention_days: config.retention_days,
            retention_runs: config.retention_runs,
        }
    }
}
