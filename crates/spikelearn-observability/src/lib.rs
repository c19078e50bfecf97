// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # spikelearn-observability
//!
//! Logging setup shared by all spikelearn crates, with per-crate debug flag
//! support.
//!
//! ## Features
//! - `file-logging`: JSON log files with daily rotation and run-folder retention

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known spikelearn crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "spikelearn",
    "spikelearn-plasticity",
    "spikelearn-config",
    "spikelearn-observability",
];

/// Tracing target for a crate name (`spikelearn-plasticity` -> `spikelearn_plasticity`)
pub fn crate_target(crate_name: &str) -> String {
    crate_name.replace('-', "_")
}
