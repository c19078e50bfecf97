//! Configuration validation
//!
//! Ensures learning-rule parameters are finite, within their valid ranges,
//! and complete for the selected rule.

use crate::{ConfigError, ConfigResult, RuleKind, SpikelearnConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Finite learning rates and decay factors
/// - Strictly positive time constants (`tc_c` may be zero)
/// - A calibration table path when the calibrated STDP rule is selected
/// - A known log level
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation found
pub fn validate_config(config: &SpikelearnConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_learning_rates(config, &mut errors);
    validate_time_constants(config, &mut errors);
    validate_required_fields(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn validate_learning_rates(config: &SpikelearnConfig, errors: &mut Vec<ConfigValidationError>) {
    let learning = &config.learning;

    let [pre, post] = learning.nu_pair();
    if !pre.is_finite() || !post.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "learning.nu".to_string(),
            reason: "must be finite".to_string(),
        });
    }

    for (field, value) in [
        ("learning.weight_decay", learning.weight_decay),
        ("learning.post_spike_weight_decay", learning.post_spike_weight_decay),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "must be finite and >= 0".to_string(),
            });
        }
    }
}

fn validate_time_constants(config: &SpikelearnConfig, errors: &mut Vec<ConfigValidationError>) {
    let learning = &config.learning;

    for (field, value) in [
        ("learning.tc_plus", learning.tc_plus),
        ("learning.tc_minus", learning.tc_minus),
        ("learning.tc_e_trace", learning.tc_e_trace),
        ("learning.tc_trace", learning.tc_trace),
        ("learning.tc_trace_neg", learning.tc_trace_neg),
    ] {
        if !value.is_finite() || value <= 0.0 {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: "must be positive".to_string(),
            });
        }
    }

    if learning.tc_c.is_nan() || learning.tc_c < 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "learning.tc_c".to_string(),
            reason: "must be >= 0".to_string(),
        });
    }
}

fn validate_required_fields(config: &SpikelearnConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.learning.rule == RuleKind::WeightDependentPostPre
        && config.learning.calibration_table.is_none()
    {
        errors.push(ConfigValidationError::MissingRequired {
            field: "learning.calibration_table".to_string(),
        });
    }
}

fn validate_logging(config: &SpikelearnConfig, errors: &mut Vec<ConfigValidationError>) {
    if !LOG_LEVELS.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Nu;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        let config = SpikelearnConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_non_positive_time_constant() {
        let mut config = SpikelearnConfig::default();
        config.learning.tc_e_trace = 0.0;

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("learning.tc_e_trace"));
        } else {
            panic!("expected validation error");
        }
    }

    #[test]
    fn test_zero_tc_c_is_allowed() {
        let mut config = SpikelearnConfig::default();
        config.learning.rule = RuleKind::Rmax;
        config.learning.tc_c = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_calibrated_rule_requires_table() {
        let mut config = SpikelearnConfig::default();
        config.learning.rule = RuleKind::WeightDependentPostPre;

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("learning.calibration_table"));
        } else {
            panic!("expected validation error");
        }

        config.learning.calibration_table = Some(PathBuf::from("STDP.txt"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_all_errors_are_collected() {
        let mut config = SpikelearnConfig::default();
        config.learning.nu = Some(Nu::Pair([f32::NAN, 0.1]));
        config.learning.weight_decay = -0.5;
        config.logging.level = "verbose".to_string();

        let result = validate_config(&config);
        if let Err(ConfigError::ValidationError(msg)) = result {
            assert!(msg.contains("learning.nu"));
            assert!(msg.contains("learning.weight_decay"));
            assert!(msg.contains("logging.level"));
        } else {
            panic!("expected validation error");
        }
    }
}
