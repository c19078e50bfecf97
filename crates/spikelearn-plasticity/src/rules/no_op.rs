// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::bounds::apply_weight_decay;
use crate::connection::Connection;
use crate::error::PlasticityResult;
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::rules::LearningRule;
use crate::signal::UpdateSignal;

/// Leaves weights alone apart from weight decay. Never clamps.
#[derive(Debug, Clone)]
pub struct NoOp {
    weight_decay: f32,
}

impl NoOp {
    pub fn new(options: &RuleOptions) -> Self {
        Self {
            weight_decay: options.weight_decay,
        }
    }
}

impl LearningRule for NoOp {
    fn name(&self) -> &'static str {
        "NoOp"
    }

    fn update(
        &mut self,
        connection: &mut Connection,
        _source: &dyn NodePopulation,
        _target: &dyn NodePopulation,
        _signal: &UpdateSignal,
    ) -> PlasticityResult<()> {
        apply_weight_decay(connection.weights_mut(), self.weight_decay);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::dense_pair;
    use ndarray::array;

    #[test]
    fn test_no_decay_leaves_weights() {
        let (source, target) = dense_pair(2, 2, 1);
        let mut conn = Connection::dense(array![[0.5, -3.0], [2.0, 0.0]]);
        let mut rule = NoOp::new(&RuleOptions::default());
        rule.update(&mut conn, &source, &target, &UpdateSignal::default()).unwrap();
        assert_eq!(conn.weights(), array![[0.5_f32, -3.0], [2.0, 0.0]].into_dyn());
    }

    #[test]
    fn test_decay_without_clamp() {
        let (source, target) = dense_pair(1, 2, 1);
        let mut conn = Connection::dense(array![[4.0, -2.0]]).with_bounds(0.0, 1.0).unwrap();
        let mut rule = NoOp::new(&RuleOptions::default().with_weight_decay(0.25));
        rule.update(&mut conn, &source, &target, &UpdateSignal::default()).unwrap();
        // Out-of-bounds values survive
        assert_eq!(conn.weights(), array![[3.0_f32, -1.5]].into_dyn());
    }
}
