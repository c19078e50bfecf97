// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! A connection together with the rule that trains it.

use spikelearn_config::{LearningConfig, RuleKind};
use tracing::info;

use crate::connection::Connection;
use crate::error::PlasticityResult;
use crate::factory::build_rule;
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::rules::LearningRule;
use crate::signal::UpdateSignal;

/// Per-timestep entry point: call [`Projection::update`] once the source and
/// target populations have finalized their spikes and traces.
#[derive(Debug)]
pub struct Projection {
    connection: Connection,
    rule: Box<dyn LearningRule>,
}

impl Projection {
    pub fn new(
        connection: Connection,
        kind: RuleKind,
        options: &RuleOptions,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        let rule = build_rule(options, kind, &connection, source, target)?;
        info!(
            target: "spikelearn_plasticity",
            rule = rule.name(),
            topology = connection.topology().name(),
            weights = ?connection.weights().shape(),
            "Bound learning rule to connection"
        );
        Ok(Self { connection, rule })
    }

    /// Use a rule that was bound elsewhere
    pub fn with_rule(connection: Connection, rule: Box<dyn LearningRule>) -> Self {
        Self { connection, rule }
    }

    pub fn from_config(
        connection: Connection,
        config: &LearningConfig,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        Self::new(connection, config.rule, &RuleOptions::from(config), source, target)
    }

    /// Run one learning step.
    ///
    /// # Errors
    /// Propagates the rule's error; the weights are unchanged in that case.
    pub fn update(
        &mut self,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
        signal: &UpdateSignal,
    ) -> PlasticityResult<()> {
        self.rule.update(&mut self.connection, source, target, signal)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn rule(&self) -> &dyn LearningRule {
        self.rule.as_ref()
    }

    pub fn rule_name(&self) -> &'static str {
        self.rule.name()
    }

    pub fn reset_state(&mut self) {
        self.rule.reset_state();
    }

    pub fn into_parts(self) -> (Connection, Box<dyn LearningRule>) {
        (self.connection, self.rule)
    }
}
