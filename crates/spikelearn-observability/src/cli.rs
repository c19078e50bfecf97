//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-spikelearn-plasticity` to raise the log level
//! of one crate.

use std::collections::HashMap;
use std::env;

use crate::{crate_target, KNOWN_CRATES};

/// Parse debug flags from command-line arguments
///
/// # Example
/// ```rust
/// use spikelearn_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-spikelearn-plasticity".to_string()]);
/// assert!(flags.is_enabled("spikelearn-plasticity"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Looks for arguments matching `--debug-{crate-name}`.
    /// `--debug-all` enables all known crates.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut enabled_crates = HashMap::new();
        let mut debug_all = false;

        for arg in args {
            if arg == "--debug-all" {
                debug_all = true;
                continue;
            }

            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                enabled_crates.insert(crate_name.to_string(), true);
            }
        }

        if debug_all {
            for crate_name in KNOWN_CRATES {
                enabled_crates.insert(crate_name.to_string(), true);
            }
        }

        CrateDebugFlags { enabled_crates }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    pub fn enabled_crates(&self) -> Vec<&String> {
        self.enabled_crates.keys().collect()
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `DEBUG` if enabled, `INFO` otherwise.
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Create an `EnvFilter` directive string from debug flags
    ///
    /// Format: `"spikelearn_plasticity=debug,info"`, or just the base level if
    /// no crate is enabled. Crate names are converted to tracing targets.
    pub fn to_filter_string(&self, base_level: &str) -> String {
        let mut crate_names: Vec<&String> = self.enabled_crates.keys().collect();
        crate_names.sort();

        let mut filters: Vec<String> = crate_names
            .into_iter()
            .map(|crate_name| format!("{}=debug", crate_target(crate_name)))
            .collect();
        filters.push(base_level.to_lowercase());
        filters.join(",")
    }
}

/// Parse debug flags from the process arguments and `SPIKELEARN_DEBUG`
///
/// Environment variable format: comma-separated crate names, or `all`.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("SPIKELEARN_DEBUG") {
        if env_var == "all" {
            for crate_name in KNOWN_CRATES {
                flags.enabled_crates.insert(crate_name.to_string(), true);
            }
        } else {
            for crate_name in env_var.split(',') {
                let crate_name = crate_name.trim();
                if !crate_name.is_empty() {
                    flags.enabled_crates.insert(crate_name.to_string(), true);
                }
            }
        }
    }

    flags
}

/// Generate help text for debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  SPIKELEARN_DEBUG={{crate-name}}[,{{crate-name}}]
  SPIKELEARN_DEBUG=all
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-spikelearn-plasticity".to_string()]);
        assert!(flags.is_enabled("spikelearn-plasticity"));
        assert!(!flags.is_enabled("spikelearn-config"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_unrelated_args_are_ignored() {
        let flags = CrateDebugFlags::from_args(vec!["--verbose".to_string(), "run".to_string()]);
        assert!(!flags.any_enabled());
    }

    #[test]
    fn test_filter_string_uses_tracing_targets() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-spikelearn-plasticity".to_string()]);
        assert_eq!(flags.to_filter_string("INFO"), "spikelearn_plasticity=debug,info");
    }

    #[test]
    fn test_filter_string_without_flags() {
        let flags = CrateDebugFlags::default();
        assert_eq!(flags.to_filter_string("warn"), "warn");
    }

    #[test]
    fn test_log_level() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-spikelearn-config".to_string()]);
        assert_eq!(flags.log_level("spikelearn-config"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("spikelearn-plasticity"), tracing::Level::INFO);
    }
}
