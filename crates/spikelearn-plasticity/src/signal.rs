// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-update inputs that do not come from the populations.

use ndarray::ArrayD;

use crate::error::{PlasticityError, PlasticityResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Reward {
    Scalar(f32),
    /// Broadcast against the tensor it modulates
    Tensor(ArrayD<f32>),
}

impl From<f32> for Reward {
    fn from(value: f32) -> Self {
        Reward::Scalar(value)
    }
}

impl From<ArrayD<f32>> for Reward {
    fn from(value: ArrayD<f32>) -> Self {
        Reward::Tensor(value)
    }
}

impl Reward {
    /// `reward * values`, broadcasting a tensor reward over `values`
    pub(crate) fn modulate(&self, values: &ArrayD<f32>) -> PlasticityResult<ArrayD<f32>> {
        match self {
            Reward::Scalar(r) => Ok(values.mapv(|v| r * v)),
            Reward::Tensor(r) => {
                let broadcast = r.broadcast(values.raw_dim()).ok_or_else(|| {
                    PlasticityError::RewardNotBroadcastable {
                        reward: r.shape().to_vec(),
                        target: values.shape().to_vec(),
                    }
                })?;
                let mut out = values.clone();
                out.zip_mut_with(&broadcast, |v, &r| *v *= r);
                Ok(out)
            }
        }
    }
}

/// Inputs for one learning step
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSignal {
    pub reward: Option<Reward>,
    /// Pre-synaptic eligibility increment (MSTDP / MSTDPET)
    pub a_plus: f32,
    /// Post-synaptic eligibility increment (MSTDP / MSTDPET)
    pub a_minus: f32,
}

impl Default for UpdateSignal {
    fn default() -> Self {
        Self {
            reward: None,
            a_plus: 1.0,
            a_minus: -1.0,
        }
    }
}

impl UpdateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reward(reward: impl Into<Reward>) -> Self {
        Self {
            reward: Some(reward.into()),
            ..Self::default()
        }
    }

    pub fn a_plus(mut self, a_plus: f32) -> Self {
        self.a_plus = a_plus;
        self
    }

    pub fn a_minus(mut self, a_minus: f32) -> Self {
        self.a_minus = a_minus;
        self
    }

    pub(crate) fn require_reward(&self, rule: &'static str) -> PlasticityResult<&Reward> {
        self.reward.as_ref().ok_or(PlasticityError::MissingReward { rule })
    }
}
