// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Simple Hebbian learning: both pre- and post-synaptic events potentiate.

use tracing::trace;

use crate::bounds::apply_bounds;
use crate::connection::Connection;
use crate::error::{PlasticityResult, Role};
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::reduction::Reduction;
use crate::rules::{require_traces, Binding, LearningRule};
use crate::signal::UpdateSignal;

const NAME: &str = "Hebbian";

#[derive(Debug, Clone)]
pub struct Hebbian {
    nu: [f32; 2],
    reduction: Reduction,
    weight_decay: f32,
    binding: Binding,
}

impl Hebbian {
    pub fn new(
        options: &RuleOptions,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        require_traces(NAME, source, Role::Source)?;
        require_traces(NAME, target, Role::Target)?;
        Ok(Self {
            nu: options.nu,
            reduction: options.reduction.clone(),
            weight_decay: options.weight_decay,
            binding: Binding::new(connection, source, target)?,
        })
    }
}

impl LearningRule for Hebbian {
    fn name(&self) -> &'static str {
        NAME
    }

    fn update(
        &mut self,
        connection: &mut Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
        _signal: &UpdateSignal,
    ) -> PlasticityResult<()> {
        let b = &self.binding;
        b.check(connection, source, target)?;

        let pre = b.correlate(
            &self.reduction,
            b.spikes(source, Role::Source)?,
            b.trace(NAME, target, Role::Target)?,
        )?;
        let post = b.correlate(
            &self.reduction,
            b.trace(NAME, source, Role::Source)?,
            b.spikes(target, Role::Target)?,
        )?;

        let (wmin, wmax) = (connection.wmin(), connection.wmax());
        let weights = connection.weights_mut();
        weights.scaled_add(self.nu[0], &pre);
        weights.scaled_add(self.nu[1], &post);
        apply_bounds(weights, self.weight_decay, wmin, wmax);

        trace!(target: "spikelearn_plasticity", rule = NAME, "Applied update");
        Ok(())
    }
}
