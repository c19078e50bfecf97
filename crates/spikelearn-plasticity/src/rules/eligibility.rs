// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Spike-timing traces and point eligibility shared by MSTDP and MSTDPET.

use ndarray::{ArrayD, ArrayViewD, Ix3};

use crate::error::{PlasticityError, PlasticityResult};
use crate::rules::{Binding, Layout};
use crate::tensor::{batched_matmul_t, batched_outer};

/// `p_plus` and `p_minus` accumulate decaying pre- and post-synaptic spikes;
/// `eligibility` pairs each with the opposite side's current spikes.
///
/// Dense: `p_plus [B, *source]`, `p_minus [B, *target]`.
/// Conv: `p_plus [B, C*kh*kw, L]` (patch form), `p_minus [B, out, L]`.
/// Eligibility is always `[B, *weight_shape]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpikeTimingState {
    pub p_plus: ArrayD<f32>,
    pub p_minus: ArrayD<f32>,
    pub eligibility: ArrayD<f32>,
}

/// Per-step constants for [`SpikeTimingState::advance`]
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimingStep {
    pub plus_decay: f32,
    pub minus_decay: f32,
    pub a_plus: f32,
    pub a_minus: f32,
}

impl SpikeTimingState {
    pub fn zeros(binding: &Binding) -> Self {
        let batch = binding.batch_size;
        let with_batch =
            |shape: &[usize]| -> Vec<usize> { std::iter::once(batch).chain(shape.iter().copied()).collect() };
        let (p_plus, p_minus) = match &binding.layout {
            Layout::Dense => (
                ArrayD::zeros(with_batch(&binding.source_shape)),
                ArrayD::zeros(with_batch(&binding.target_shape)),
            ),
            Layout::Conv(conv) => (
                ArrayD::zeros(vec![batch, conv.patch_len(), conv.locations]),
                ArrayD::zeros(vec![batch, conv.out_channels, conv.locations]),
            ),
        };
        Self {
            p_plus,
            p_minus,
            eligibility: ArrayD::zeros(with_batch(&binding.weight_shape)),
        }
    }

    pub fn reset(&mut self) {
        self.p_plus.fill(0.0);
        self.p_minus.fill(0.0);
        self.eligibility.fill(0.0);
    }

    /// Decay the timing traces, add this step's spikes and recompute the
    /// point eligibility. Returns the next state; `self` is untouched.
    pub fn advance(
        &self,
        binding: &Binding,
        pre_spikes: ArrayViewD<'_, f32>,
        post_spikes: ArrayViewD<'_, f32>,
        step: TimingStep,
    ) -> PlasticityResult<Self> {
        let (pre, post) = match &binding.layout {
            Layout::Dense => (pre_spikes.to_owned(), post_spikes.to_owned()),
            Layout::Conv(conv) => (
                conv.patches(pre_spikes)?.into_dyn(),
                conv.channels(post_spikes, binding.batch_size)?.into_dyn(),
            ),
        };

        let mut p_plus = self.p_plus.mapv(|p| p * step.plus_decay);
        p_plus.scaled_add(step.a_plus, &pre);
        let mut p_minus = self.p_minus.mapv(|p| p * step.minus_decay);
        p_minus.scaled_add(step.a_minus, &post);

        let product = match &binding.layout {
            Layout::Dense => {
                let (pre, post) = (binding.flat(pre.view())?, binding.flat(post.view())?);
                let (p_plus, p_minus) = (binding.flat(p_plus.view())?, binding.flat(p_minus.view())?);
                let mut e = batched_outer(p_plus.view(), post.view());
                e.zip_mut_with(&batched_outer(pre.view(), p_minus.view()), |a, &b| *a += b);
                e
            }
            Layout::Conv(_) => {
                let (pre, post) = (rank3(&pre)?, rank3(&post)?);
                let (p_plus3, p_minus3) = (rank3(&p_plus)?, rank3(&p_minus)?);
                let mut e = batched_matmul_t(post, p_plus3);
                e.zip_mut_with(&batched_matmul_t(p_minus3, pre), |a, &b| *a += b);
                e
            }
        };
        let eligibility = binding.as_batched_weights(product)?;

        Ok(Self {
            p_plus,
            p_minus,
            eligibility,
        })
    }
}

fn rank3(tensor: &ArrayD<f32>) -> PlasticityResult<ndarray::ArrayView3<'_, f32>> {
    tensor
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| PlasticityError::shape_mismatch("patch tensor rank", &[3], &[tensor.ndim()]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, Conv2dGeometry};
    use crate::nodes::SpikingNodes;
    use crate::rules::test_support::{dense_pair, tensor};
    use ndarray::{Array2, Array4};

    const STEP: TimingStep = TimingStep {
        plus_decay: 0.5,
        minus_decay: 0.25,
        a_plus: 1.0,
        a_minus: -1.0,
    };

    #[test]
    fn test_dense_advance() {
        let (source, target) = dense_pair(2, 1, 1);
        let binding = Binding::new(&Connection::dense(Array2::zeros((2, 1))), &source, &target).unwrap();
        let state = SpikeTimingState::zeros(&binding);

        let pre = tensor(&[1.0, 0.0], &[1, 2]);
        let post = tensor(&[0.0], &[1, 1]);
        let state = state.advance(&binding, pre.view(), post.view(), STEP).unwrap();
        assert_eq!(state.p_plus, tensor(&[1.0, 0.0], &[1, 2]));
        // No post spike yet, and p_minus is still zero
        assert_eq!(state.eligibility, tensor(&[0.0, 0.0], &[1, 2, 1]));

        let post = tensor(&[1.0], &[1, 1]);
        let quiet = tensor(&[0.0, 0.0], &[1, 2]);
        let state = state.advance(&binding, quiet.view(), post.view(), STEP).unwrap();
        assert_eq!(state.p_plus, tensor(&[0.5, 0.0], &[1, 2]));
        assert_eq!(state.p_minus, tensor(&[-1.0], &[1, 1]));
        assert_eq!(state.eligibility, tensor(&[0.5, 0.0], &[1, 2, 1]));
    }

    #[test]
    fn test_conv_state_shapes() {
        let source = SpikingNodes::new(&[2, 4, 4], 3).unwrap();
        let target = SpikingNodes::new(&[5, 2, 2], 3).unwrap();
        let geometry = Conv2dGeometry {
            padding: (0, 0),
            stride: (2, 2),
        };
        let conn = Connection::conv2d(Array4::zeros((5, 2, 2, 2)), geometry).unwrap();
        let binding = Binding::new(&conn, &source, &target).unwrap();
        let state = SpikeTimingState::zeros(&binding);
        assert_eq!(state.p_plus.shape(), &[3, 8, 4]);
        assert_eq!(state.p_minus.shape(), &[3, 5, 4]);
        assert_eq!(state.eligibility.shape(), &[3, 5, 2, 2, 2]);

        let pre = ArrayD::ones(vec![3, 2, 4, 4]);
        let post = ArrayD::ones(vec![3, 5, 2, 2]);
        let next = state.advance(&binding, pre.view(), post.view(), STEP).unwrap();
        assert_eq!(next.eligibility.shape(), &[3, 5, 2, 2, 2]);
        // Each kernel tap sees 4 positions: 4 * (1*1 + (-1)*1) = 0
        assert!(next.eligibility.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn test_reset() {
        let (source, target) = dense_pair(1, 1, 1);
        let binding = Binding::new(&Connection::dense(Array2::zeros((1, 1))), &source, &target).unwrap();
        let mut state = SpikeTimingState::zeros(&binding);
        state.p_plus.fill(3.0);
        state.reset();
        assert_eq!(state, SpikeTimingState::zeros(&binding));
    }
}
