// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `spikelearn.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SpikelearnConfig {
    pub learning: LearningConfig,
    pub logging: LoggingConfig,
}

/// Which plasticity rule a connection is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[default]
    NoOp,
    Hebbian,
    PostPre,
    WeightDependentPostPre,
    Mstdp,
    Mstdpet,
    Rmax,
}

impl RuleKind {
    pub const ALL: [RuleKind; 7] = [
        RuleKind::NoOp,
        RuleKind::Hebbian,
        RuleKind::PostPre,
        RuleKind::WeightDependentPostPre,
        RuleKind::Mstdp,
        RuleKind::Mstdpet,
        RuleKind::Rmax,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::NoOp => "no_op",
            RuleKind::Hebbian => "hebbian",
            RuleKind::PostPre => "post_pre",
            RuleKind::WeightDependentPostPre => "weight_dependent_post_pre",
            RuleKind::Mstdp => "mstdp",
            RuleKind::Mstdpet => "mstdpet",
            RuleKind::Rmax => "rmax",
        }
    }

    /// Rules that need a reward value on every update
    pub fn is_reward_modulated(&self) -> bool {
        matches!(self, RuleKind::Mstdp | RuleKind::Mstdpet | RuleKind::Rmax)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        RuleKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ConfigError::InvalidValue(format!("unknown learning rule '{}'", s)))
    }
}

/// Batch reduction applied to per-sample updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionKind {
    #[default]
    Mean,
    Sum,
}

/// Learning rate(s): a single value is used for both the pre- and
/// post-synaptic factor.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Nu {
    Scalar(f32),
    Pair([f32; 2]),
}

impl Nu {
    pub fn as_pair(&self) -> [f32; 2] {
        match *self {
            Nu::Scalar(v) => [v, v],
            Nu::Pair(pair) => pair,
        }
    }
}

impl From<f32> for Nu {
    fn from(value: f32) -> Self {
        Nu::Scalar(value)
    }
}

impl From<[f32; 2]> for Nu {
    fn from(pair: [f32; 2]) -> Self {
        Nu::Pair(pair)
    }
}

impl FromStr for Nu {
    type Err = ConfigError;

    /// Accepts `"0.1"` or `"0.1,0.2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidValue(format!("invalid learning rate '{}'", s)))
        };
        let parts: Vec<&str> = s.split(',').collect();
        match parts.as_slice() {
            [single] => Ok(Nu::Scalar(parse(single)?)),
            [pre, post] => Ok(Nu::Pair([parse(pre)?, parse(post)?])),
            _ => Err(ConfigError::InvalidValue(format!(
                "nu must have one or two entries, got '{}'",
                s
            ))),
        }
    }
}

/// Learning-rule options for a single connection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LearningConfig {
    pub rule: RuleKind,
    /// Absent means `[0.0, 0.0]`
    pub nu: Option<Nu>,
    pub reduction: ReductionKind,
    pub weight_decay: f32,
    pub post_spike_weight_decay: f32,
    pub tc_plus: f32,
    pub tc_minus: f32,
    pub tc_e_trace: f32,
    /// 0 keeps the full `s - p` correction; large values approach plain Hebbian
    pub tc_c: f32,
    pub tc_trace: f32,
    pub tc_trace_neg: f32,
    /// Plain-text 101 x 120 table for the calibrated STDP rule
    pub calibration_table: Option<PathBuf>,
}

impl LearningConfig {
    pub fn nu_pair(&self) -> [f32; 2] {
        self.nu.map(|nu| nu.as_pair()).unwrap_or([0.0, 0.0])
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            rule: RuleKind::NoOp,
            nu: None,
            reduction: ReductionKind::Mean,
            weight_decay: 0.0,
            post_spike_weight_decay: 0.0,
            tc_plus: 20.0,
            tc_minus: 20.0,
            tc_e_trace: 25.0,
            tc_c: 5.0,
            tc_trace: 20.0,
            tc_trace_neg: 20.0,
            calibration_table: None,
        }
    }
}

/// Encoding of log files written under `log_dir`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFileFormat {
    Text,
    #[default]
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFileFormat,
    pub log_dir: Option<PathBuf>,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFileFormat::default(),
            log_dir: None,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learning_defaults() {
        let config = LearningConfig::default();
        assert_eq!(config.nu_pair(), [0.0, 0.0]);
        assert_eq!(config.tc_plus, 20.0);
        assert_eq!(config.tc_minus, 20.0);
        assert_eq!(config.tc_e_trace, 25.0);
        assert_eq!(config.tc_c, 5.0);
        assert_eq!(config.reduction, ReductionKind::Mean);
    }

    #[test]
    fn test_log_file_format_from_toml() {
        assert_eq!(LoggingConfig::default().format, LogFileFormat::Json);
        let config: SpikelearnConfig = toml::from_str("[logging]\nformat = \"text\"").unwrap();
        assert_eq!(config.logging.format, LogFileFormat::Text);
    }

    #[test]
    fn test_scalar_nu_expands_to_pair() {
        let config: SpikelearnConfig = toml::from_str("[learning]\nnu = 0.5").unwrap();
        assert_eq!(config.learning.nu_pair(), [0.5, 0.5]);
    }

    #[test]
    fn test_pair_nu() {
        let config: SpikelearnConfig =
            toml::from_str("[learning]\nrule = \"post_pre\"\nnu = [0.1, 0.2]").unwrap();
        assert_eq!(config.learning.rule, RuleKind::PostPre);
        assert_eq!(config.learning.nu_pair(), [0.1, 0.2]);
    }

    #[test]
    fn test_three_entry_nu_is_rejected() {
        let result: Result<SpikelearnConfig, _> = toml::from_str("[learning]\nnu = [0.1, 0.2, 0.3]");
        assert!(result.is_err());
    }

    #[test]
    fn test_rule_kind_from_str() {
        assert_eq!("MSTDPET".parse::<RuleKind>().unwrap(), RuleKind::Mstdpet);
        assert_eq!(
            "weight-dependent-post-pre".parse::<RuleKind>().unwrap(),
            RuleKind::WeightDependentPostPre
        );
        assert!("oja".parse::<RuleKind>().is_err());
    }

    #[test]
    fn test_nu_from_str() {
        assert_eq!("0.3".parse::<Nu>().unwrap(), Nu::Scalar(0.3));
        assert_eq!("0.1, 0.2".parse::<Nu>().unwrap(), Nu::Pair([0.1, 0.2]));
        assert!("0.1,0.2,0.3".parse::<Nu>().is_err());
        assert!("fast".parse::<Nu>().is_err());
    }

    #[test]
    fn test_json_round_trip_of_rule_kind() {
        let json = serde_json::to_string(&RuleKind::WeightDependentPostPre).unwrap();
        assert_eq!(json, "\"weight_dependent_post_pre\"");
    }
}
