// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reward-modulated STDP (Florian 2007).
//!
//! Each step applies `nu[0] * reduce(reward * eligibility)` using the
//! eligibility computed on the previous step, then advances the timing
//! traces and recomputes the eligibility.

use ndarray::{ArrayD, ArrayViewD, Axis};
use tracing::{info, trace};

use crate::bounds::apply_bounds;
use crate::connection::Connection;
use crate::error::{PlasticityResult, Role};
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::reduction::Reduction;
use crate::rules::eligibility::{SpikeTimingState, TimingStep};
use crate::rules::{decay, Binding, Layout, LearningRule};
use crate::signal::UpdateSignal;

const NAME: &str = "MSTDP";

#[derive(Debug, Clone)]
pub struct Mstdp {
    nu: [f32; 2],
    reduction: Reduction,
    weight_decay: f32,
    tc_plus: f32,
    tc_minus: f32,
    binding: Binding,
    state: SpikeTimingState,
}

impl Mstdp {
    pub fn new(
        options: &RuleOptions,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        let binding = Binding::new(connection, source, target)?;
        let state = SpikeTimingState::zeros(&binding);
        info!(
            target: "spikelearn_plasticity",
            rule = NAME,
            batch_size = binding.batch_size,
            eligibility_shape = ?state.eligibility.shape(),
            "Allocated eligibility state"
        );
        Ok(Self {
            nu: options.nu,
            reduction: options.reduction.clone(),
            weight_decay: options.weight_decay,
            tc_plus: options.tc_plus,
            tc_minus: options.tc_minus,
            binding,
            state,
        })
    }

    /// Decaying pre-synaptic spike trace
    pub fn p_plus(&self) -> ArrayViewD<'_, f32> {
        self.state.p_plus.view()
    }

    /// Decaying post-synaptic spike trace
    pub fn p_minus(&self) -> ArrayViewD<'_, f32> {
        self.state.p_minus.view()
    }

    /// `[batch, *weight_shape]`, applied on the next update
    pub fn eligibility(&self) -> ArrayViewD<'_, f32> {
        self.state.eligibility.view()
    }
}

impl LearningRule for Mstdp {
    fn name(&self) -> &'static str {
        NAME
    }

    fn update(
        &mut self,
        connection: &mut Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
        signal: &UpdateSignal,
    ) -> PlasticityResult<()> {
        let reward = signal.require_reward(NAME)?;
        let b = &self.binding;
        b.check(connection, source, target)?;
        let pre_spikes = b.spikes(source, Role::Source)?;
        let post_spikes = b.spikes(target, Role::Target)?;

        let modulated = reward.modulate(&self.state.eligibility)?;
        let delta: ArrayD<f32> = match b.layout {
            Layout::Dense => self.reduction.reduce_to(modulated.view(), &b.weight_shape)?,
            // Shared kernels accumulate over the whole batch
            Layout::Conv(_) => modulated.sum_axis(Axis(0)),
        };

        let dt = connection.dt();
        let step = TimingStep {
            plus_decay: decay(dt, self.tc_plus),
            minus_decay: decay(dt, self.tc_minus),
            a_plus: signal.a_plus,
            a_minus: signal.a_minus,
        };
        let next = self.state.advance(b, pre_spikes, post_spikes, step)?;

        let (wmin, wmax) = (connection.wmin(), connection.wmax());
        let weights = connection.weights_mut();
        weights.scaled_add(self.nu[0], &delta);
        apply_bounds(weights, self.weight_decay, wmin, wmax);
        self.state = next;

        trace!(target: "spikelearn_plasticity", rule = NAME, "Applied update");
        Ok(())
    }

    fn reset_state(&mut self) {
        self.state.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlasticityError;
    use crate::rules::test_support::{dense_pair, tensor};
    use ndarray::Array2;

    #[test]
    fn test_requires_reward() {
        let (source, target) = dense_pair(1, 1, 1);
        let mut conn = Connection::dense(Array2::zeros((1, 1)));
        let mut rule = Mstdp::new(&RuleOptions::default(), &conn, &source, &target).unwrap();
        assert!(matches!(
            rule.update(&mut conn, &source, &target, &UpdateSignal::default()),
            Err(PlasticityError::MissingReward { .. })
        ));
    }

    #[test]
    fn test_eligibility_applied_one_step_later() {
        let (mut source, mut target) = dense_pair(1, 1, 1);
        let mut conn = Connection::dense(Array2::zeros((1, 1)));
        let options = RuleOptions::default().with_nu(1.0);
        let mut rule = Mstdp::new(&options, &conn, &source, &target).unwrap();
        let signal = UpdateSignal::with_reward(1.0);

        source.set_spikes(tensor(&[1.0], &[1, 1])).unwrap();
        target.set_spikes(tensor(&[1.0], &[1, 1])).unwrap();
        rule.update(&mut conn, &source, &target, &signal).unwrap();
        // Eligibility was zero when the weights were updated
        assert_eq!(conn.weights()[[0, 0]], 0.0);
        // p_plus * post + pre * p_minus = 1 - 1
        assert_eq!(rule.eligibility()[[0, 0, 0]], 0.0);

        source.set_spikes(tensor(&[0.0], &[1, 1])).unwrap();
        rule.update(&mut conn, &source, &target, &signal).unwrap();
        let e = (-1.0_f32 / 20.0).exp();
        assert!((rule.eligibility()[[0, 0, 0]] - e).abs() < 1e-6);
        assert_eq!(conn.weights()[[0, 0]], 0.0);

        rule.update(&mut conn, &source, &target, &signal).unwrap();
        assert!((conn.weights()[[0, 0]] - e).abs() < 1e-6);
    }

    #[test]
    fn test_reset_state() {
        let (mut source, target) = dense_pair(2, 1, 1);
        let mut conn = Connection::dense(Array2::zeros((2, 1)));
        let mut rule = Mstdp::new(&RuleOptions::default(), &conn, &source, &target).unwrap();
        source.set_spikes(tensor(&[1.0, 1.0], &[1, 2])).unwrap();
        rule.update(&mut conn, &source, &target, &UpdateSignal::with_reward(0.5)).unwrap();
        assert!(rule.p_plus().iter().any(|&p| p != 0.0));
        rule.reset_state();
        assert!(rule.p_plus().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_bad_reward_leaves_state() {
        let (mut source, target) = dense_pair(2, 1, 1);
        let mut conn = Connection::dense(Array2::zeros((2, 1)));
        let mut rule = Mstdp::new(&RuleOptions::default(), &conn, &source, &target).unwrap();
        source.set_spikes(tensor(&[1.0, 1.0], &[1, 2])).unwrap();
        let reward = ArrayD::from_elem(vec![3], 1.0_f32);
        assert!(matches!(
            rule.update(&mut conn, &source, &target, &UpdateSignal::with_reward(reward)),
            Err(PlasticityError::RewardNotBroadcastable { .. })
        ));
        assert!(rule.p_plus().iter().all(|&p| p == 0.0));
    }
}
