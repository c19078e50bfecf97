// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Construction options shared by all rules.

use std::path::PathBuf;

use spikelearn_config::{LearningConfig, Nu};

use crate::reduction::Reduction;

/// Rule hyper-parameters. Time constants are in timesteps of the
/// connection's `dt` unit.
#[derive(Debug, Clone)]
pub struct RuleOptions {
    /// `[pre, post]` learning rates
    pub nu: [f32; 2],
    pub reduction: Reduction,
    pub weight_decay: f32,
    /// Weight-dependent STDP only
    pub post_spike_weight_decay: f32,
    pub tc_plus: f32,
    pub tc_minus: f32,
    pub tc_e_trace: f32,
    pub tc_c: f32,
    pub tc_trace: f32,
    pub tc_trace_neg: f32,
    pub calibration_table: Option<PathBuf>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        RuleOptions::from(&LearningConfig::default())
    }
}

impl From<&LearningConfig> for RuleOptions {
    fn from(config: &LearningConfig) -> Self {
        Self {
            nu: config.nu_pair(),
            reduction: Reduction::from(config.reduction),
            weight_decay: config.weight_decay,
            post_spike_weight_decay: config.post_spike_weight_decay,
            tc_plus: config.tc_plus,
            tc_minus: config.tc_minus,
            tc_e_trace: config.tc_e_trace,
            tc_c: config.tc_c,
            tc_trace: config.tc_trace,
            tc_trace_neg: config.tc_trace_neg,
            calibration_table: config.calibration_table.clone(),
        }
    }
}

impl RuleOptions {
    /// A scalar rate is used for both factors
    pub fn with_nu(mut self, nu: impl Into<Nu>) -> Self {
        self.nu = nu.into().as_pair();
        self
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f32) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_calibration_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.calibration_table = Some(path.into());
        self
    }
}
