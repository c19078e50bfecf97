// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! STDP with weight-dependent update magnitudes.
//!
//! Dense connections take each synapse's update from a [`CalibrationTable`]
//! indexed by the current weight (in percent of `nu[0]`) and by a timing
//! difference recovered from the batch-reduced trace products:
//!
//! ```text
//! depression    delta =  tc_trace_neg * ln(reduce(pre_spike ⊗ post_neg_trace))
//! potentiation  delta = -tc_trace     * ln(reduce(pre_trace ⊗ post_spike))
//! ```
//!
//! A zero product yields a non-finite delta, which lands in the table's
//! fallback column. Convolutional connections use a soft-bound rule without
//! the table.

use ndarray::{ArrayD, Zip};
use tracing::{debug, info, trace, warn};

use crate::bounds::apply_bounds;
use crate::calibration::CalibrationTable;
use crate::connection::Connection;
use crate::error::{PlasticityError, PlasticityResult, Role, TraceKind};
use crate::nodes::NodePopulation;
use crate::options::RuleOptions;
use crate::reduction::Reduction;
use crate::rules::{require_finite_bounds, require_traces, Binding, Layout, LearningRule};
use crate::signal::UpdateSignal;

const NAME: &str = "WeightDependentPostPre";

#[derive(Debug, Clone)]
pub struct WeightDependentPostPre {
    nu: [f32; 2],
    reduction: Reduction,
    weight_decay: f32,
    post_spike_weight_decay: f32,
    tc_trace: f32,
    tc_trace_neg: f32,
    table: Option<CalibrationTable>,
    binding: Binding,
}

impl WeightDependentPostPre {
    /// `table` is mandatory for dense connections and unused by
    /// convolutions.
    pub fn new(
        options: &RuleOptions,
        table: Option<CalibrationTable>,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        require_traces(NAME, source, Role::Source)?;
        require_finite_bounds(NAME, connection)?;
        let binding = Binding::new(connection, source, target)?;

        match binding.layout {
            Layout::Dense => {
                if !target.capabilities().negative_traces {
                    return Err(PlasticityError::MissingTraces {
                        rule: NAME,
                        role: Role::Target,
                        trace: TraceKind::NegativeSpike,
                    });
                }
                if table.is_none() {
                    return Err(PlasticityError::MissingCalibrationTable { rule: NAME });
                }
                if !options.nu[0].is_finite() || options.nu[0] == 0.0 {
                    return Err(PlasticityError::InvalidWeightScale {
                        rule: NAME,
                        nu: options.nu[0],
                    });
                }
                if options.nu[0] != options.nu[1] {
                    // nu[0] doubles as the scale of the weight index
                    warn!(
                        target: "spikelearn_plasticity",
                        nu_pre = options.nu[0],
                        nu_post = options.nu[1],
                        "Calibrated STDP expects equal learning rates"
                    );
                }
            }
            Layout::Conv(_) => require_traces(NAME, target, Role::Target)?,
        }

        info!(
            target: "spikelearn_plasticity",
            rule = NAME,
            calibrated = table.is_some(),
            "Bound weight-dependent STDP"
        );

        Ok(Self {
            nu: options.nu,
            reduction: options.reduction.clone(),
            weight_decay: options.weight_decay,
            post_spike_weight_decay: options.post_spike_weight_decay,
            tc_trace: options.tc_trace,
            tc_trace_neg: options.tc_trace_neg,
            table,
            binding,
        })
    }

    pub fn calibration_table(&self) -> Option<&CalibrationTable> {
        self.table.as_ref()
    }

    fn dense_update(
        &self,
        table: &CalibrationTable,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<ArrayD<f32>> {
        let b = &self.binding;
        let weights = connection.weights();
        let pre_spikes = b.spikes(source, Role::Source)?;
        let post_spikes = b.spikes(target, Role::Target)?;

        let pre_outer = b.correlate(
            &self.reduction,
            pre_spikes.view(),
            b.negative_trace(NAME, target, Role::Target)?,
        )?;
        let pre_delta = pre_outer.mapv(|v| self.tc_trace_neg * v.ln());
        let (pre_lookup, pre_fallbacks) = table.lookup(weights.view(), self.nu[0], pre_delta.view())?;

        let post_outer = b.correlate(
            &self.reduction,
            b.trace(NAME, source, Role::Source)?,
            post_spikes.view(),
        )?;
        let post_delta = post_outer.mapv(|v| -self.tc_trace * v.ln());
        let (post_lookup, post_fallbacks) = table.lookup(weights.view(), self.nu[0], post_delta.view())?;

        if pre_fallbacks + post_fallbacks > 0 {
            debug!(
                target: "spikelearn_plasticity",
                rule = NAME,
                pre_fallbacks,
                post_fallbacks,
                "Timing differences outside the calibration table"
            );
        }

        // Post-synaptic activity broadcast over every pre-synaptic row
        let ones = ArrayD::<f32>::ones(pre_spikes.raw_dim());
        let post_activity = b.correlate(&self.reduction, ones.view(), post_spikes)?;

        let mut update = ArrayD::zeros(weights.raw_dim());
        Zip::from(&mut update)
            .and(&weights)
            .and(&pre_lookup)
            .and(&post_lookup)
            .and(&post_activity)
            .for_each(|u, &w, &pre, &post, &activity| {
                *u = self.nu[0] * pre + self.nu[1] * post - self.post_spike_weight_decay * w * activity;
            });
        Ok(update)
    }

    fn conv_update(
        &self,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<ArrayD<f32>> {
        let b = &self.binding;
        let weights = connection.weights();
        let (wmin, wmax) = (connection.wmin(), connection.wmax());
        let mut update = ArrayD::zeros(weights.raw_dim());

        if self.nu[0] != 0.0 {
            let pre = b.correlate(
                &self.reduction,
                b.spikes(source, Role::Source)?,
                b.trace(NAME, target, Role::Target)?,
            )?;
            Zip::from(&mut update)
                .and(&pre)
                .and(&weights)
                .for_each(|u, &p, &w| *u -= self.nu[0] * p * (w - wmin));
        }
        if self.nu[1] != 0.0 {
            let post = b.correlate(
                &self.reduction,
                b.trace(NAME, source, Role::Source)?,
                b.spikes(target, Role::Target)?,
            )?;
            let span = wmax - wmin;
            Zip::from(&mut update)
                .and(&post)
                .for_each(|u, &p| *u += self.nu[1] * p * span);
        }
        Ok(update)
    }
}

impl LearningRule for WeightDependentPostPre {
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
        self.binding.check(connection, source, target)?;

        // Both lookups see the weights from before this step
        let update = match (&self.binding.layout, &self.table) {
            (Layout::Dense, Some(table)) => self.dense_update(table, connection, source, target)?,
            (Layout::Dense, None) => return Err(PlasticityError::MissingCalibrationTable { rule: NAME }),
            (Layout::Conv(_), _) => self.conv_update(connection, source, target)?,
        };

        let (wmin, wmax) = (connection.wmin(), connection.wmax());
        let weights = connection.weights_mut();
        *weights += &update;
        apply_bounds(weights, self.weight_decay, wmin, wmax);

        trace!(target: "spikelearn_plasticity", rule = NAME, "Applied update");
        Ok(())
    }
}
