// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Spikelearn Plasticity
//!
//! Synaptic learning rules for spiking networks:
//! - NoOp, Hebbian and PostPre (trace-based STDP)
//! - Weight-dependent STDP driven by a calibration table
//! - Reward-modulated STDP (MSTDP, MSTDPET) and Rmax
//!
//! ## Architecture
//! - A rule is bound once to a [`Connection`] and its source and target
//!   populations; shapes and capabilities are checked at that point
//! - Dense and 2-D convolutional layouts share every rule except Rmax
//! - Updates are atomic: a failed update leaves weights and state untouched
//! - Batch samples fan out across threads with `rayon`

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bounds;
pub mod calibration;
pub mod connection;
pub mod error;
pub mod factory;
pub mod nodes;
pub mod options;
pub mod projection;
pub mod reduction;
pub mod rules;
pub mod signal;
pub mod tensor;

// Re-export key types
pub use bounds::{apply_bounds, apply_weight_decay, clamp_weights};
pub use calibration::{CalibrationTable, CALIBRATION_COLS, CALIBRATION_ROWS};
pub use connection::{Connection, Conv2dGeometry, Topology};
pub use error::{PlasticityError, PlasticityResult, Role, TraceKind};
pub use factory::build_rule;
pub use nodes::{NodeCapabilities, NodePopulation, SpikingNodes};
pub use options::RuleOptions;
pub use projection::Projection;
pub use reduction::Reduction;
pub use rules::{Hebbian, LearningRule, Mstdp, Mstdpet, NoOp, PostPre, Rmax, WeightDependentPostPre};
pub use signal::{Reward, UpdateSignal};
pub use spikelearn_config::RuleKind;
pub use tensor::{conv_output_size, unfold, Tensor};
