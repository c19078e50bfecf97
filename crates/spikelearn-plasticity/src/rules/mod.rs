// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Learning rules.
//!
//! Every rule is bound once to a connection and its two populations. Binding
//! checks capabilities, resolves the tensor [`Layout`] from the connection
//! topology and allocates any trace state. `update` is then called once per
//! timestep after the populations have finalized their spikes and traces.

use std::fmt;

use ndarray::{Array3, ArrayD, ArrayViewD, Ix4};

use crate::connection::{Conv2dGeometry, Connection, Topology};
use crate::error::{PlasticityError, PlasticityResult, Role, TraceKind};
use crate::nodes::NodePopulation;
use crate::reduction::Reduction;
use crate::signal::UpdateSignal;
use crate::tensor::{batched_matmul_t, batched_outer, expect_shape, flatten_batch, flatten_spatial, unfold};

mod eligibility;
mod hebbian;
mod mstdp;
mod mstdpet;
mod no_op;
mod post_pre;
mod rmax;
mod weight_dependent;

pub use hebbian::Hebbian;
pub use mstdp::Mstdp;
pub use mstdpet::Mstdpet;
pub use no_op::NoOp;
pub use post_pre::PostPre;
pub use rmax::Rmax;
pub use weight_dependent::WeightDependentPostPre;

/// A synaptic plasticity rule bound to one connection
pub trait LearningRule: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Apply one learning step to `connection`.
    ///
    /// # Errors
    /// Fails without touching the weights when inputs disagree with the
    /// shapes seen at binding time, a required reward is missing, or a
    /// calibrated lookup leaves the table.
    fn update(
        &mut self,
        connection: &mut Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
        signal: &UpdateSignal,
    ) -> PlasticityResult<()>;

    /// Zero any eligibility state (e.g. between episodes)
    fn reset_state(&mut self) {}
}

/// Tensor layout a rule operates in, fixed at binding time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// Weights `[source_n, target_n]`
    Dense,
    Conv(ConvLayout),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConvLayout {
    pub out_channels: usize,
    pub in_channels: usize,
    pub kernel: (usize, usize),
    pub geometry: Conv2dGeometry,
    /// Output positions per channel
    pub locations: usize,
}

impl ConvLayout {
    /// Rows of an unfolded patch matrix
    pub fn patch_len(&self) -> usize {
        self.in_channels * self.kernel.0 * self.kernel.1
    }

    /// `[B, C, H, W] -> [B, C*kh*kw, L]`
    pub fn patches(&self, tensor: ArrayViewD<'_, f32>) -> PlasticityResult<Array3<f32>> {
        let rank = tensor.ndim();
        let image = tensor
            .into_dimensionality::<Ix4>()
            .map_err(|_| PlasticityError::shape_mismatch("convolution input rank", &[4], &[rank]))?;
        unfold(image, self.kernel, self.geometry.padding, self.geometry.stride)
    }

    /// `[B, out, h, w] -> [B, out, L]`
    pub fn channels(&self, tensor: ArrayViewD<'_, f32>, batch: usize) -> PlasticityResult<Array3<f32>> {
        flatten_spatial(tensor, batch, self.out_channels)
    }
}

/// Shapes captured when a rule is bound
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Binding {
    pub layout: Layout,
    pub batch_size: usize,
    pub weight_shape: Vec<usize>,
    pub source_shape: Vec<usize>,
    pub target_shape: Vec<usize>,
}

impl Binding {
    pub fn new(
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<Self> {
        if source.batch_size() != target.batch_size() {
            return Err(PlasticityError::shape_mismatch(
                "post-synaptic batch size",
                &[source.batch_size()],
                &[target.batch_size()],
            ));
        }

        let weight_shape = connection.weights().shape().to_vec();
        let layout = match connection.topology() {
            Topology::Dense | Topology::Local => {
                let expected = [source.n(), target.n()];
                if weight_shape != expected {
                    return Err(PlasticityError::shape_mismatch("weights", &expected, &weight_shape));
                }
                Layout::Dense
            }
            Topology::Conv2d(geometry) => {
                let expected_target = connection.conv_output_shape(source.shape()).ok_or_else(|| {
                    PlasticityError::InvalidGeometry(format!(
                        "kernel {:?} cannot be applied to pre-synaptic shape {:?}",
                        weight_shape,
                        source.shape()
                    ))
                })?;
                if source.shape()[0] != weight_shape[1] {
                    return Err(PlasticityError::shape_mismatch(
                        "pre-synaptic channels",
                        &weight_shape[1..2],
                        &source.shape()[..1],
                    ));
                }
                if target.shape() != expected_target {
                    return Err(PlasticityError::shape_mismatch(
                        "post-synaptic shape",
                        &expected_target,
                        target.shape(),
                    ));
                }
                Layout::Conv(ConvLayout {
                    out_channels: weight_shape[0],
                    in_channels: weight_shape[1],
                    kernel: (weight_shape[2], weight_shape[3]),
                    geometry,
                    locations: expected_target[1] * expected_target[2],
                })
            }
        };

        Ok(Self {
            layout,
            batch_size: source.batch_size(),
            weight_shape,
            source_shape: source.shape().to_vec(),
            target_shape: target.shape().to_vec(),
        })
    }

    /// Re-check an update's inputs against the bound shapes
    pub fn check(
        &self,
        connection: &Connection,
        source: &dyn NodePopulation,
        target: &dyn NodePopulation,
    ) -> PlasticityResult<()> {
        let weights = connection.weights();
        if weights.shape() != self.weight_shape.as_slice() {
            return Err(PlasticityError::shape_mismatch("weights", &self.weight_shape, weights.shape()));
        }
        for (role, pop, shape) in [
            (Role::Source, source, &self.source_shape),
            (Role::Target, target, &self.target_shape),
        ] {
            if pop.shape() != shape.as_slice() || pop.batch_size() != self.batch_size {
                let expected: Vec<usize> = std::iter::once(self.batch_size).chain(shape.iter().copied()).collect();
                let actual: Vec<usize> = std::iter::once(pop.batch_size()).chain(pop.shape().iter().copied()).collect();
                return Err(PlasticityError::shape_mismatch(format!("{} population", role), &expected, &actual));
            }
        }
        Ok(())
    }

    fn shape_of(&self, role: Role) -> &[usize] {
        match role {
            Role::Source => &self.source_shape,
            Role::Target => &self.target_shape,
        }
    }

    pub fn spikes<'a>(&self, pop: &'a dyn NodePopulation, role: Role) -> PlasticityResult<ArrayViewD<'a, f32>> {
        let spikes = pop.spikes();
        expect_shape(format!("{} spikes", role), &spikes, self.batch_size, self.shape_of(role))?;
        Ok(spikes)
    }

    pub fn trace<'a>(
        &self,
        rule: &'static str,
        pop: &'a dyn NodePopulation,
        role: Role,
    ) -> PlasticityResult<ArrayViewD<'a, f32>> {
        let trace = pop.trace().ok_or(PlasticityError::MissingTraces {
            rule,
            role,
            trace: TraceKind::Spike,
        })?;
        expect_shape(format!("{} trace", role), &trace, self.batch_size, self.shape_of(role))?;
        Ok(trace)
    }

    pub fn negative_trace<'a>(
        &self,
        rule: &'static str,
        pop: &'a dyn NodePopulation,
        role: Role,
    ) -> PlasticityResult<ArrayViewD<'a, f32>> {
        let trace = pop.negative_trace().ok_or(PlasticityError::MissingTraces {
            rule,
            role,
            trace: TraceKind::NegativeSpike,
        })?;
        expect_shape(format!("{} negative trace", role), &trace, self.batch_size, self.shape_of(role))?;
        Ok(trace)
    }

    pub fn firing_probability<'a>(
        &self,
        rule: &'static str,
        pop: &'a dyn NodePopulation,
    ) -> PlasticityResult<ArrayViewD<'a, f32>> {
        let prob = pop.firing_probability().ok_or(PlasticityError::NotStochastic { rule })?;
        expect_shape("post-synaptic firing probability", &prob, self.batch_size, &self.target_shape)?;
        Ok(prob)
    }

    /// `[B, *shape] -> [B, n]`
    pub fn flat(&self, tensor: ArrayViewD<'_, f32>) -> PlasticityResult<ndarray::Array2<f32>> {
        flatten_batch(tensor, self.batch_size)
    }

    /// Batch-reduced correlation of a pre-synaptic and a post-synaptic
    /// tensor, laid out like the weights.
    ///
    /// Dense: `reduce(pre ⊗ post)`. Conv: `reduce(post · patches(pre)ᵀ)`.
    pub fn correlate(
        &self,
        reduction: &Reduction,
        pre: ArrayViewD<'_, f32>,
        post: ArrayViewD<'_, f32>,
    ) -> PlasticityResult<ArrayD<f32>> {
        let product = match &self.layout {
            Layout::Dense => batched_outer(self.flat(pre)?.view(), self.flat(post)?.view()),
            Layout::Conv(conv) => {
                let patches = conv.patches(pre)?;
                let channels = conv.channels(post, self.batch_size)?;
                batched_matmul_t(channels.view(), patches.view())
            }
        };
        self.reduce(reduction, product)
    }

    /// Batch-reduce a per-sample update and lay it out like the weights
    pub fn reduce(&self, reduction: &Reduction, update: Array3<f32>) -> PlasticityResult<ArrayD<f32>> {
        let per_sample = update.shape()[1..].to_vec();
        let reduced = reduction.reduce_to(update.into_dyn().view(), &per_sample)?;
        self.as_weights(reduced)
    }

    /// Reshape a `[p, q]` product onto the weight shape
    pub fn as_weights(&self, values: ArrayD<f32>) -> PlasticityResult<ArrayD<f32>> {
        if values.shape() == self.weight_shape.as_slice() {
            return Ok(values);
        }
        let reshaped = values
            .to_shape(self.weight_shape.clone())
            .map_err(|_| PlasticityError::shape_mismatch("weight update", &self.weight_shape, values.shape()))?;
        Ok(reshaped.into_owned())
    }

    /// `[B, p, q] -> [B, *weight_shape]`
    pub fn as_batched_weights(&self, values: Array3<f32>) -> PlasticityResult<ArrayD<f32>> {
        let dims: Vec<usize> = std::iter::once(values.dim().0).chain(self.weight_shape.iter().copied()).collect();
        let reshaped = values
            .to_shape(dims.clone())
            .map_err(|_| PlasticityError::shape_mismatch("eligibility", &dims, values.shape()))?;
        Ok(reshaped.into_owned())
    }
}

/// Construction-time capability check for spike traces
pub(crate) fn require_traces(
    rule: &'static str,
    pop: &dyn NodePopulation,
    role: Role,
) -> PlasticityResult<()> {
    if !pop.capabilities().traces {
        return Err(PlasticityError::MissingTraces {
            rule,
            role,
            trace: TraceKind::Spike,
        });
    }
    Ok(())
}

pub(crate) fn require_finite_bounds(rule: &'static str, connection: &Connection) -> PlasticityResult<()> {
    if !connection.has_finite_bounds() {
        return Err(PlasticityError::InfiniteBounds {
            rule,
            wmin: connection.wmin(),
            wmax: connection.wmax(),
        });
    }
    Ok(())
}

/// Exponential decay factor over one timestep
pub(crate) fn decay(dt: f32, time_constant: f32) -> f32 {
    (-dt / time_constant).exp()
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::nodes::SpikingNodes;
    use ndarray::{Array2, Array4};

    #[test]
    fn test_dense_binding() {
        let (source, target) = dense_pair(3, 2, 1);
        let conn = dense_connection(Array2::zeros((3, 2)));
        let binding = Binding::new(&conn, &source, &target).unwrap();
        assert_eq!(binding.layout, Layout::Dense);
        assert!(binding.check(&conn, &source, &target).is_ok());
    }

    #[test]
    fn test_dense_binding_rejects_transposed_weights() {
        let (source, target) = dense_pair(3, 2, 1);
        let conn = dense_connection(Array2::zeros((2, 3)));
        assert!(matches!(
            Binding::new(&conn, &source, &target),
            Err(PlasticityError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_conv_binding() {
        let source = SpikingNodes::new(&[2, 5, 5], 1).unwrap();
        let target = SpikingNodes::new(&[3, 3, 3], 1).unwrap();
        let conn = Connection::conv2d(Array4::zeros((3, 2, 3, 3)), Conv2dGeometry::default()).unwrap();
        let binding = Binding::new(&conn, &source, &target).unwrap();
        let Layout::Conv(conv) = binding.layout else {
            panic!("expected a convolution layout");
        };
        assert_eq!(conv.patch_len(), 18);
        assert_eq!(conv.locations, 9);
    }

    #[test]
    fn test_conv_binding_rejects_wrong_target() {
        let source = SpikingNodes::new(&[2, 5, 5], 1).unwrap();
        let target = SpikingNodes::new(&[3, 4, 4], 1).unwrap();
        let conn = Connection::conv2d(Array4::zeros((3, 2, 3, 3)), Conv2dGeometry::default()).unwrap();
        assert!(Binding::new(&conn, &source, &target).is_err());
    }

    #[test]
    fn test_check_catches_resized_population() {
        let (source, target) = dense_pair(3, 2, 1);
        let conn = dense_connection(Array2::zeros((3, 2)));
        let binding = Binding::new(&conn, &source, &target).unwrap();
        let (bigger, _) = dense_pair(3, 2, 2);
        assert!(binding.check(&conn, &bigger, &target).is_err());
    }

    #[test]
    fn test_decay() {
        assert!((decay(1.0, 20.0) - (-0.05_f32).exp()).abs() < 1e-7);
    }
}
