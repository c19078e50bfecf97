// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Build a boxed rule from a [`RuleKind`].

use spikelearn_config::RuleKind;
use tracing::debug;

use crate::calibration::CalibrationTable;
use crate::connection::Connection;
use crate::error::PlasticityResult;
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::rules::{Hebbian, LearningRule, Mstdp, Mstdpet, NoOp, PostPre, Rmax, WeightDependentPostPre};

/// Bind a rule of `kind` to `connection` and its populations.
///
/// The calibration table for [`RuleKind::WeightDependentPostPre`] is read
/// from `options.calibration_table` when a path is set.
///
/// # Errors
/// Returns the rule's construction error, or an I/O or parse error from the
/// calibration file.
pub fn build_rule(
    options: &RuleOptions,
    kind: RuleKind,
    connection: &Connection,
    source: &dyn NodePopulation,
    target: &dyn NodePopulation,
) -> PlasticityResult<Box<dyn LearningRule>> {
    debug!(
        target: "spikelearn_plasticity",
        rule = %kind,
        topology = connection.topology().name(),
        "Building learning rule"
    );

    let rule: Box<dyn LearningRule> = match kind {
        RuleKind::NoOp => Box::new(NoOp::new(options)),
        RuleKind::Hebbian => Box::new(Hebbian::new(options, connection, source, target)?),
        RuleKind::PostPre => Box::new(PostPre::new(options, connection, source, target)?),
        RuleKind::WeightDependentPostPre => {
            let table = options
                .calibration_table
                .as_ref()
                .map(CalibrationTable::load)
                .transpose()?;
            Box::new(WeightDependentPostPre::new(options, table, connection, source, target)?)
        }
        RuleKind::Mstdp => Box::new(Mstdp::new(options, connection, source, target)?),
        RuleKind::Mstdpet => Box::new(Mstdpet::new(options, connection, source, target)?),
        RuleKind::Rmax => Box::new(Rmax::new(options, connection, source, target)?),
    };
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlasticityError;
    use crate::nodes::SpikingNodes;
    use ndarray::Array2;

    #[test]
    fn test_builds_every_dense_rule() {
        let source = SpikingNodes::new(&[2], 1).unwrap().with_traces(true);
        let target = SpikingNodes::new(&[3], 1)
            .unwrap()
            .with_traces(false)
            .with_negative_traces()
            .stochastic();
        let conn = Connection::dense(Array2::zeros((2, 3)));

        for kind in RuleKind::ALL {
            let result = build_rule(&RuleOptions::default(), kind, &conn, &source, &target);
            match kind {
                RuleKind::WeightDependentPostPre => assert!(result.is_err()),
                _ => assert!(result.is_ok(), "{kind} failed: {:?}", result.err()),
            }
        }
    }

    #[test]
    fn test_missing_calibration_file() {
        let source = SpikingNodes::new(&[1], 1).unwrap().with_traces(false);
        let target = SpikingNodes::new(&[1], 1).unwrap().with_traces(false).with_negative_traces();
        let conn = Connection::dense(Array2::zeros((1, 1))).with_bounds(-1.0, 1.0).unwrap();
        let options = RuleOptions::default().with_calibration_table("/nonexistent/calibration.txt");
        assert!(matches!(
            build_rule(&options, RuleKind::WeightDependentPostPre, &conn, &source, &target),
            Err(PlasticityError::Io { .. })
        ));
    }
}
