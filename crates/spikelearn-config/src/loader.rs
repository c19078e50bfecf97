// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, Nu, RuleKind, SpikelearnConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "spikelearn.toml";

/// Find the spikelearn configuration file
///
/// Search order:
/// 1. `SPIKELEARN_CONFIG_PATH` environment variable
/// 2. Current working directory: `./spikelearn.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("SPIKELEARN_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by SPIKELEARN_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|path| path.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet SPIKELEARN_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the file is not found, contains invalid TOML, or an
/// override carries an unparseable value.
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<SpikelearnConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: SpikelearnConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `SPIKELEARN_RULE` -> `learning.rule`
/// - `SPIKELEARN_NU` -> `learning.nu` (`"0.1"` or `"0.1,0.2"`)
/// - `SPIKELEARN_WEIGHT_DECAY` -> `learning.weight_decay`
/// - `SPIKELEARN_CALIBRATION_TABLE` -> `learning.calibration_table`
/// - `SPIKELEARN_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut SpikelearnConfig) -> ConfigResult<()> {
    let vars: HashMap<String, String> = [
        ("rule", "SPIKELEARN_RULE"),
        ("nu", "SPIKELEARN_NU"),
        ("weight_decay", "SPIKELEARN_WEIGHT_DECAY"),
        ("calibration_table", "SPIKELEARN_CALIBRATION_TABLE"),
        ("log_level", "SPIKELEARN_LOG_LEVEL"),
    ]
    .into_iter()
    .filter_map(|(key, var)| env::var(var).ok().map(|value| (key.to_string(), value)))
    .collect();

    apply_overrides(config, &vars)
}

/// Apply CLI argument overrides to configuration
///
/// Recognized keys: `rule`, `nu`, `weight_decay`, `calibration_table`,
/// `log_level`.
pub fn apply_cli_overrides(
    config: &mut SpikelearnConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    apply_overrides(config, cli_args)
}

fn apply_overrides(
    config: &mut SpikelearnConfig,
    overrides: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = overrides.get("rule") {
        config.learning.rule = value.parse::<RuleKind>()?;
    }
    if let Some(value) = overrides.get("nu") {
        config.learning.nu = Some(value.parse::<Nu>()?);
    }
    if let Some(value) = overrides.get("weight_decay") {
        config.learning.weight_decay = value.trim().parse::<f32>().map_err(|_| {
            ConfigError::InvalidValue(format!("invalid weight_decay '{}'", value))
        })?;
    }
    if let Some(value) = overrides.get("calibration_table") {
        config.learning.calibration_table = Some(PathBuf::from(value));
    }
    if let Some(value) = overrides.get("log_level") {
        config.logging.level = value.clone();
    }
    Ok(())
}
