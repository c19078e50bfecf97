// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for rule construction and updates.
//!
//! Construction-time variants are configuration errors: the rule cannot be
//! bound to the given connection/populations. Call-time variants leave the
//! weights untouched.

use std::fmt;
use std::path::PathBuf;

/// Result type for plasticity operations
pub type PlasticityResult<T> = Result<T, PlasticityError>;

/// Which side of a connection a population sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Target,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => f.write_str("pre-synaptic"),
            Role::Target => f.write_str("post-synaptic"),
        }
    }
}

/// Trace flavour a rule depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Spike,
    AdditiveSpike,
    NegativeSpike,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceKind::Spike => f.write_str("spike traces"),
            TraceKind::AdditiveSpike => f.write_str("additive spike traces"),
            TraceKind::NegativeSpike => f.write_str("negative spike traces"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlasticityError {
    #[error("{rule}: {role} nodes must record {trace}")]
    MissingTraces {
        rule: &'static str,
        role: Role,
        trace: TraceKind,
    },

    #[error("{rule}: connection must define finite wmin and wmax, got [{wmin}, {wmax}]")]
    InfiniteBounds {
        rule: &'static str,
        wmin: f32,
        wmax: f32,
    },

    #[error("{rule} is not supported for {topology} connections")]
    UnsupportedTopology {
        rule: &'static str,
        topology: &'static str,
    },

    #[error("{rule} needs stochastically firing post-synaptic nodes exposing a firing probability")]
    NotStochastic { rule: &'static str },

    #[error("{rule} works on un-batched tensors, but {role} batch size is {batch_size}")]
    UnsupportedBatch {
        rule: &'static str,
        role: Role,
        batch_size: usize,
    },

    #[error("{rule} requires a calibration table")]
    MissingCalibrationTable { rule: &'static str },

    #[error("{rule}: nu[0] scales the calibration weight index and must be finite and non-zero, got {nu}")]
    InvalidWeightScale { rule: &'static str, nu: f32 },

    #[error("{rule} requires a reward signal on every update")]
    MissingReward { rule: &'static str },

    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("reward of shape {reward:?} cannot be broadcast to {target:?}")]
    RewardNotBroadcastable {
        reward: Vec<usize>,
        target: Vec<usize>,
    },

    #[error("invalid weight bounds [{wmin}, {wmax}]")]
    InvalidBounds { wmin: f32, wmax: f32 },

    #[error("invalid timestep {0}: must be finite and > 0")]
    InvalidTimestep(f32),

    #[error("invalid connection geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid population: {0}")]
    InvalidPopulation(String),

    #[error("calibration table must be {expected:?} (rows, columns), found {actual:?}")]
    CalibrationShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("calibration table line {line}: invalid value '{token}'")]
    CalibrationParse { line: usize, token: String },

    #[error("calibration weight index {index} is outside table rows 0..={max_row}")]
    CalibrationIndex { index: f32, max_row: usize },

    #[error("failed to read calibration table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PlasticityError {
    pub(crate) fn shape_mismatch(what: impl Into<String>, expected: &[usize], actual: &[usize]) -> Self {
        PlasticityError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// True for errors that can only be raised while binding a rule
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PlasticityError::MissingTraces { .. }
                | PlasticityError::InfiniteBounds { .. }
                | PlasticityError::UnsupportedTopology { .. }
                | PlasticityError::NotStochastic { .. }
                | PlasticityError::UnsupportedBatch { .. }
                | PlasticityError::MissingCalibrationTable { .. }
                | PlasticityError::InvalidWeightScale { .. }
                | PlasticityError::InvalidBounds { .. }
                | PlasticityError::InvalidTimestep(_)
                | PlasticityError::InvalidGeometry(_)
                | PlasticityError::CalibrationShape { .. }
                | PlasticityError::CalibrationParse { .. }
                | PlasticityError::Io { .. }
        )
    }
}
