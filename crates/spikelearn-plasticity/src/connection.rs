// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weighted connections between two node populations.
//!
//! Dense and locally connected weights are `[source_n, target_n]`;
//! convolution kernels are `[out_channels, in_channels, kh, kw]`.

use ndarray::{Array2, Array4, ArrayD, ArrayViewD};

use crate::error::{PlasticityError, PlasticityResult};
use crate::tensor::conv_output_size;

/// Padding and stride of a 2-D convolution, as (rows, columns)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dGeometry {
    pub padding: (usize, usize),
    pub stride: (usize, usize),
}

impl Default for Conv2dGeometry {
    fn default() -> Self {
        Self {
            padding: (0, 0),
            stride: (1, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// All-to-all
    Dense,
    /// Locally connected; weights are stored densely with a fixed zero mask
    Local,
    /// Shared 2-D kernels
    Conv2d(Conv2dGeometry),
}

impl Topology {
    pub fn name(&self) -> &'static str {
        match self {
            Topology::Dense => "dense",
            Topology::Local => "local",
            Topology::Conv2d(_) => "conv2d",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    weights: ArrayD<f32>,
    wmin: f32,
    wmax: f32,
    dt: f32,
    topology: Topology,
}

impl Connection {
    pub fn dense(weights: Array2<f32>) -> Self {
        Self::with_topology(weights.into_dyn(), Topology::Dense)
    }

    pub fn local(weights: Array2<f32>) -> Self {
        Self::with_topology(weights.into_dyn(), Topology::Local)
    }

    pub fn conv2d(weights: Array4<f32>, geometry: Conv2dGeometry) -> PlasticityResult<Self> {
        if geometry.stride.0 == 0 || geometry.stride.1 == 0 {
            return Err(PlasticityError::InvalidGeometry(format!(
                "stride must be positive, got {:?}",
                geometry.stride
            )));
        }
        if weights.is_empty() {
            return Err(PlasticityError::InvalidGeometry(format!(
                "kernel {:?} has an empty dimension",
                weights.dim()
            )));
        }
        Ok(Self::with_topology(weights.into_dyn(), Topology::Conv2d(geometry)))
    }

    fn with_topology(weights: ArrayD<f32>, topology: Topology) -> Self {
        Self {
            weights,
            wmin: f32::NEG_INFINITY,
            wmax: f32::INFINITY,
            dt: 1.0,
            topology,
        }
    }

    /// Set weight bounds; either may be infinite
    pub fn with_bounds(mut self, wmin: f32, wmax: f32) -> PlasticityResult<Self> {
        if wmin.is_nan() || wmax.is_nan() || wmin > wmax {
            return Err(PlasticityError::InvalidBounds { wmin, wmax });
        }
        self.wmin = wmin;
        self.wmax = wmax;
        Ok(self)
    }

    /// Set the simulation timestep
    pub fn with_dt(mut self, dt: f32) -> PlasticityResult<Self> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(PlasticityError::InvalidTimestep(dt));
        }
        self.dt = dt;
        Ok(self)
    }

    pub fn weights(&self) -> ArrayViewD<'_, f32> {
        self.weights.view()
    }

    /// Rules are the only writers during an update
    pub(crate) fn weights_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.weights
    }

    pub fn into_weights(self) -> ArrayD<f32> {
        self.weights
    }

    pub fn wmin(&self) -> f32 {
        self.wmin
    }

    pub fn wmax(&self) -> f32 {
        self.wmax
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn has_finite_bounds(&self) -> bool {
        self.wmin.is_finite() && self.wmax.is_finite()
    }

    /// Spatial extent of the post-synaptic map for a `[C, H, W]` input
    pub fn conv_output_shape(&self, input: &[usize]) -> Option<[usize; 3]> {
        let Topology::Conv2d(geometry) = self.topology else {
            return None;
        };
        let [_, in_h, in_w] = <[usize; 3]>::try_from(input).ok()?;
        let shape = self.weights.shape();
        let out_h = conv_output_size(in_h, shape[2], geometry.padding.0, geometry.stride.0)?;
        let out_w = conv_output_size(in_w, shape[3], geometry.padding.1, geometry.stride.1)?;
        Some([shape[0], out_h, out_w])
    }
}
