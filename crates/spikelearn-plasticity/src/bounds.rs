// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weight decay and clamping shared by every rule.

use ndarray::ArrayD;

/// `w -= decay * w`, skipped when `decay` is zero
pub fn apply_weight_decay(weights: &mut ArrayD<f32>, weight_decay: f32) {
    if weight_decay != 0.0 {
        weights.mapv_inplace(|w| w - weight_decay * w);
    }
}

/// Clamp into `[wmin, wmax]` when at least one bound is finite.
///
/// NaN weights pass through unchanged.
pub fn clamp_weights(weights: &mut ArrayD<f32>, wmin: f32, wmax: f32) {
    if wmin == f32::NEG_INFINITY && wmax == f32::INFINITY {
        return;
    }
    weights.mapv_inplace(|w| {
        if w < wmin {
            wmin
        } else if w > wmax {
            wmax
        } else {
            w
        }
    });
}

/// Decay followed by clamping; the tail of every learning update
pub fn apply_bounds(weights: &mut ArrayD<f32>, weight_decay: f32, wmin: f32, wmax: f32) {
    apply_weight_decay(weights, weight_decay);
    clamp_weights(weights, wmin, wmax);
}
