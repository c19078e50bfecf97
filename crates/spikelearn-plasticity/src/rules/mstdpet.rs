// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reward-modulated STDP with an eligibility trace (Florian 2007).
//!
//! The point eligibility is low-pass filtered before it meets the reward:
//!
//! ```text
//! trace <- trace * exp(-dt / tc_e_trace) + eligibility / tc_e_trace
//! w     <- w + nu[0] * dt * reward * trace
//! ```

use ndarray::{ArrayD, ArrayViewD, Axis};
use tracing::{info, trace};

use crate::bounds::apply_bounds;
use crate::connection::Connection;
use crate::error::{PlasticityError, PlasticityResult, Role};
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::rules::eligibility::{SpikeTimingState, TimingStep};
use crate::rules::{decay, Binding, Layout, LearningRule};
use crate::signal::UpdateSignal;

const NAME: &str = "MSTDPET";

#[derive(Debug, Clone)]
pub struct Mstdpet {
    nu: [f32; 2],
    weight_decay: f32,
    tc_plus: f32,
    tc_minus: f32,
    tc_e_trace: f32,
    binding: Binding,
    state: SpikeTimingState,
    /// Same shape as the point eligibility
    eligibility_trace: ArrayD<f32>,
}

impl Mstdpet {
    /// Dense connections are un-batched: both populations must have batch
    /// size 1.
    pub fn new(
        options: &RuleOptions,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        let binding = Binding::new(connection, source, target)?;
        if binding.layout == Layout::Dense && binding.batch_size != 1 {
            return Err(PlasticityError::UnsupportedBatch {
                rule: NAME,
                role: Role::Source,
                batch_size: binding.batch_size,
            });
        }

        let state = SpikeTimingState::zeros(&binding);
        let eligibility_trace = ArrayD::zeros(state.eligibility.raw_dim());
        info!(
            target: "spikelearn_plasticity",
            rule = NAME,
            eligibility_shape = ?eligibility_trace.shape(),
            "Allocated eligibility state"
        );

        Ok(Self {
            nu: options.nu,
            weight_decay: options.weight_decay,
            tc_plus: options.tc_plus,
            tc_minus: options.tc_minus,
            tc_e_trace: options.tc_e_trace,
            binding,
            state,
            eligibility_trace,
        })
    }

    /// Dense state is reported without the batch axis
    fn unbatched<'a>(&self, tensor: &'a ArrayD<f32>) -> ArrayViewD<'a, f32> {
        match self.binding.layout {
            Layout::Dense => tensor.index_axis(Axis(0), 0),
            Layout::Conv(_) => tensor.view(),
        }
    }

    pub fn p_plus(&self) -> ArrayViewD<'_, f32> {
        self.unbatched(&self.state.p_plus)
    }

    pub fn p_minus(&self) -> ArrayViewD<'_, f32> {
        self.unbatched(&self.state.p_minus)
    }

    pub fn eligibility(&self) -> ArrayViewD<'_, f32> {
        self.unbatched(&self.state.eligibility)
    }

    pub fn eligibility_trace(&self) -> ArrayViewD<'_, f32> {
        self.unbatched(&self.eligibility_trace)
    }
}

impl LearningRule for Mstdpet {
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
        let dt = connection.dt();

        let trace_decay = decay(dt, self.tc_e_trace);
        let mut eligibility_trace = self.eligibility_trace.mapv(|e| e * trace_decay);
        eligibility_trace.scaled_add(1.0 / self.tc_e_trace, &self.state.eligibility);

        // Dense batch is a single sample, so this sum only drops the axis
        let delta = reward.modulate(&eligibility_trace)?.sum_axis(Axis(0));

        let step = TimingStep {
            plus_decay: decay(dt, self.tc_plus),
            minus_decay: decay(dt, self.tc_minus),
            a_plus: signal.a_plus,
            a_minus: signal.a_minus,
        };
        let next = self.state.advance(b, pre_spikes, post_spikes, step)?;

        let (wmin, wmax) = (connection.wmin(), connection.wmax());
        let weights = connection.weights_mut();
        weights.scaled_add(self.nu[0] * dt, &delta);
        apply_bounds(weights, self.weight_decay, wmin, wmax);
        self.eligibility_trace = eligibility_trace;
        self.state = next;

        trace!(target: "spikelearn_plasticity", rule = NAME, "Applied update");
        Ok(())
    }

    fn reset_state(&mut self) {
        self.state.reset();
        self.eligibility_trace.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{dense_pair, tensor};
    use ndarray::Array2;

    #[test]
    fn test_dense_requires_single_sample() {
        let (source, target) = dense_pair(2, 2, 4);
        let conn = Connection::dense(Array2::zeros((2, 2)));
        assert!(matches!(
            Mstdpet::new(&RuleOptions::default(), &conn, &source, &target),
            Err(PlasticityError::UnsupportedBatch { batch_size: 4, .. })
        ));
    }

    #[test]
    fn test_unbatched_state_shapes() {
        let (source, target) = dense_pair(3, 2, 1);
        let conn = Connection::dense(Array2::zeros((3, 2)));
        let rule = Mstdpet::new(&RuleOptions::default(), &conn, &source, &target).unwrap();
        assert_eq!(rule.p_plus().shape(), &[3]);
        assert_eq!(rule.p_minus().shape(), &[2]);
        assert_eq!(rule.eligibility().shape(), &[3, 2]);
        assert_eq!(rule.eligibility_trace().shape(), &[3, 2]);
    }

    #[test]
    fn test_trace_integrates_eligibility() {
        let (mut source, mut target) = dense_pair(1, 1, 1);
        let mut conn = Connection::dense(Array2::zeros((1, 1)));
        let options = RuleOptions::default().with_nu(0.5);
        let mut rule = Mstdpet::new(&options, &conn, &source, &target).unwrap();
        let signal = UpdateSignal::with_reward(2.0);

        // Post fires after a pre spike: eligibility = p_plus * post
        source.set_spikes(tensor(&[1.0], &[1, 1])).unwrap();
        rule.update(&mut conn, &source, &target, &signal).unwrap();
        source.set_spikes(tensor(&[0.0], &[1, 1])).unwrap();
        target.set_spikes(tensor(&[1.0], &[1, 1])).unwrap();
        rule.update(&mut conn, &source, &target, &signal).unwrap();
        let e = (-1.0_f32 / 20.0).exp();
        assert!((rule.eligibility()[[0, 0]] - e).abs() < 1e-6);
        assert_eq!(conn.weights()[[0, 0]], 0.0);

        target.set_spikes(tensor(&[0.0], &[1, 1])).unwrap();
        rule.update(&mut conn, &source, &target, &signal).unwrap();
        let trace = e / 25.0;
        assert!((rule.eligibility_trace()[[0, 0]] - trace).abs() < 1e-6);
        assert!((conn.weights()[[0, 0]] - 0.5 * 2.0 * trace).abs() < 1e-6);
    }
}
