// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reward-maximizing rule for stochastic post-synaptic populations
//! (Vasilaki et al. 2009).

use ndarray::{Array2, ArrayViewD, Axis, Zip};
use tracing::{info, trace};

use crate::bounds::apply_bounds;
use crate::connection::{Connection, Topology};
use crate::error::{PlasticityError, PlasticityResult, Role, TraceKind};
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::rules::{require_traces, Binding, LearningRule};
use crate::signal::UpdateSignal;

const NAME: &str = "Rmax";

#[derive(Debug, Clone)]
pub struct Rmax {
    nu: [f32; 2],
    weight_decay: f32,
    tc_c: f32,
    tc_e_trace: f32,
    binding: Binding,
    /// `[source_n, target_n]`
    eligibility_trace: Array2<f32>,
}

impl Rmax {
    pub fn new(
        options: &RuleOptions,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        if let Topology::Conv2d(_) = connection.topology() {
            return Err(PlasticityError::UnsupportedTopology {
                rule: NAME,
                topology: connection.topology().name(),
            });
        }
        let binding = Binding::new(connection, source, target)?;

        require_traces(NAME, source, Role::Source)?;
        if !source.capabilities().traces_additive {
            return Err(PlasticityError::MissingTraces {
                rule: NAME,
                role: Role::Source,
                trace: TraceKind::AdditiveSpike,
            });
        }
        if !target.capabilities().stochastic {
            return Err(PlasticityError::NotStochastic { rule: NAME });
        }
        for (role, pop) in [(Role::Source, source), (Role::Target, target)] {
            if pop.batch_size() != 1 {
                return Err(PlasticityError::UnsupportedBatch {
                    rule: NAME,
                    role,
                    batch_size: pop.batch_size(),
                });
            }
        }

        let eligibility_trace = Array2::zeros((source.n(), target.n()));
        info!(
            target: "spikelearn_plasticity",
            rule = NAME,
            source_n = source.n(),
            target_n = target.n(),
            tc_c = options.tc_c,
            "Allocated eligibility trace"
        );

        Ok(Self {
            nu: options.nu,
            weight_decay: options.weight_decay,
            tc_c: options.tc_c,
            tc_e_trace: options.tc_e_trace,
            binding,
            eligibility_trace,
        })
    }

    pub fn eligibility_trace(&self) -> ArrayViewD<'_, f32> {
        self.eligibility_trace.view().into_dyn()
    }
}

impl LearningRule for Rmax {
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
        let pre_trace = b.flat(b.trace(NAME, source, Role::Source)?)?;
        let post_spikes = b.flat(b.spikes(target, Role::Target)?)?;
        let post_prob = b.flat(b.firing_probability(NAME, target)?)?;
        let dt = connection.dt();

        // Spike minus its expectation; the correction fades as tc_c grows
        let mut post_error = post_spikes.index_axis(Axis(0), 0).to_owned();
        let smoothing = self.tc_c / dt;
        Zip::from(&mut post_error)
            .and(post_prob.index_axis(Axis(0), 0))
            .for_each(|e, &p| *e -= p / (1.0 + smoothing * p));

        let mut eligibility_trace = self.eligibility_trace.mapv(|e| e * (1.0 - dt / self.tc_e_trace));
        let pre = pre_trace.index_axis(Axis(0), 0);
        Zip::from(eligibility_trace.rows_mut())
            .and(&pre)
            .for_each(|mut row, &x| row.scaled_add(x, &post_error));

        let delta = reward.modulate(&eligibility_trace.clone().into_dyn())?;

        let (wmin, wmax) = (connection.wmin(), connection.wmax());
        let weights = connection.weights_mut();
        weights.scaled_add(self.nu[0], &delta);
        apply_bounds(weights, self.weight_decay, wmin, wmax);
        self.eligibility_trace = eligibility_trace;

        trace!(target: "spikelearn_plasticity", rule = NAME, "Applied update");
        Ok(())
    }

    fn reset_state(&mut self) {
        self.eligibility_trace.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Conv2dGeometry;
    use crate::nodes::SpikingNodes;
    use crate::rules::test_support::tensor;
    use ndarray::{Array2, Array4};

    fn populations(n_source: usize, n_target: usize) -> (SpikingNodes, SpikingNodes) {
        (
            SpikingNodes::new(&[n_source], 1).unwrap().with_traces(true),
            SpikingNodes::new(&[n_target], 1).unwrap().stochastic(),
        )
    }

    fn step(tc_c: f32, spike: f32, prob: f32) -> f32 {
        let (mut source, mut target) = populations(1, 1);
        source.set_trace(tensor(&[2.0], &[1, 1])).unwrap();
        target.set_spikes(tensor(&[spike], &[1, 1])).unwrap();
        target.set_firing_probability(tensor(&[prob], &[1, 1])).unwrap();

        let mut conn = Connection::dense(Array2::zeros((1, 1)));
        let mut options = RuleOptions::default().with_nu(1.0);
        options.tc_c = tc_c;
        let mut rule = Rmax::new(&options, &conn, &source, &target).unwrap();
        rule.update(&mut conn, &source, &target, &UpdateSignal::with_reward(1.0)).unwrap();
        conn.weights()[[0, 0]]
    }

    #[test]
    fn test_zero_tc_c_uses_full_correction() {
        assert!((step(0.0, 1.0, 0.25) - 0.75 * 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_large_tc_c_approaches_hebbian() {
        assert!((step(1.0e9, 1.0, 0.25) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_probability_is_hebbian() {
        assert!((step(5.0, 1.0, 0.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_trace_decays_linearly() {
        let (mut source, mut target) = populations(1, 1);
        source.set_trace(tensor(&[1.0], &[1, 1])).unwrap();
        target.set_spikes(tensor(&[1.0], &[1, 1])).unwrap();
        let mut conn = Connection::dense(Array2::zeros((1, 1)));
        let mut rule = Rmax::new(&RuleOptions::default(), &conn, &source, &target).unwrap();
        let signal = UpdateSignal::with_reward(0.0);
        rule.update(&mut conn, &source, &target, &signal).unwrap();
        assert_eq!(rule.eligibility_trace()[[0, 0]], 1.0);

        target.set_spikes(tensor(&[0.0], &[1, 1])).unwrap();
        rule.update(&mut conn, &source, &target, &signal).unwrap();
        assert!((rule.eligibility_trace()[[0, 0]] - (1.0 - 1.0 / 25.0)).abs() < 1e-6);

        rule.reset_state();
        assert_eq!(rule.eligibility_trace()[[0, 0]], 0.0);
    }

    #[test]
    fn test_rejects_conv() {
        let source = SpikingNodes::new(&[1, 3, 3], 1).unwrap().with_traces(true);
        let target = SpikingNodes::new(&[1, 1, 1], 1).unwrap().stochastic();
        let conn = Connection::conv2d(Array4::zeros((1, 1, 3, 3)), Conv2dGeometry::default()).unwrap();
        assert!(matches!(
            Rmax::new(&RuleOptions::default(), &conn, &source, &target),
            Err(PlasticityError::UnsupportedTopology { topology: "conv2d", .. })
        ));
    }

    #[test]
    fn test_rejects_conv_before_shape_checks() {
        // Target shape does not match the kernel output
        let source = SpikingNodes::new(&[1, 3, 3], 1).unwrap().with_traces(true);
        let target = SpikingNodes::new(&[4], 1).unwrap().stochastic();
        let conn = Connection::conv2d(Array4::zeros((1, 1, 3, 3)), Conv2dGeometry::default()).unwrap();
        assert!(matches!(
            Rmax::new(&RuleOptions::default(), &conn, &source, &target),
            Err(PlasticityError::UnsupportedTopology { topology: "conv2d", .. })
        ));
    }

    #[test]
    fn test_capability_checks() {
        let conn = Connection::dense(Array2::zeros((1, 1)));
        let target = SpikingNodes::new(&[1], 1).unwrap().stochastic();
        let resetting = SpikingNodes::new(&[1], 1).unwrap().with_traces(false);
        assert!(matches!(
            Rmax::new(&RuleOptions::default(), &conn, &resetting, &target),
            Err(PlasticityError::MissingTraces {
                trace: TraceKind::AdditiveSpike,
                ..
            })
        ));

        let (source, _) = populations(1, 1);
        let deterministic = SpikingNodes::new(&[1], 1).unwrap();
        assert!(matches!(
            Rmax::new(&RuleOptions::default(), &conn, &source, &deterministic),
            Err(PlasticityError::NotStochastic { .. })
        ));
    }

    #[test]
    fn test_rejects_batches() {
        let source = SpikingNodes::new(&[1], 2).unwrap().with_traces(true);
        let target = SpikingNodes::new(&[1], 2).unwrap().stochastic();
        let conn = Connection::dense(Array2::zeros((1, 1)));
        assert!(matches!(
            Rmax::new(&RuleOptions::default(), &conn, &source, &target),
            Err(PlasticityError::UnsupportedBatch { batch_size: 2, .. })
        ));
    }
}
