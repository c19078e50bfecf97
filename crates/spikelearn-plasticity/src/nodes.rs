// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Node populations as seen by the learning rules.
//!
//! Rules only read population state. Every tensor is `[batch, *shape]`.

use ndarray::{ArrayD, ArrayViewD};

use crate::error::{PlasticityError, PlasticityResult};

/// Optional state a population records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeCapabilities {
    pub traces: bool,
    /// Traces accumulate spikes instead of resetting to 1
    pub traces_additive: bool,
    pub negative_traces: bool,
    /// Spikes are sampled from a firing probability
    pub stochastic: bool,
}

/// Read-only view of a population of spiking nodes
pub trait NodePopulation {
    /// Per-sample shape, without the batch axis
    fn shape(&self) -> &[usize];

    fn batch_size(&self) -> usize;

    /// Current spikes as 0/1
    fn spikes(&self) -> ArrayViewD<'_, f32>;

    fn trace(&self) -> Option<ArrayViewD<'_, f32>>;

    fn negative_trace(&self) -> Option<ArrayViewD<'_, f32>> {
        None
    }

    fn firing_probability(&self) -> Option<ArrayViewD<'_, f32>> {
        None
    }

    fn capabilities(&self) -> NodeCapabilities;

    /// Nodes per sample
    fn n(&self) -> usize {
        self.shape().iter().product()
    }
}

/// Owned population state, updated by the simulation between rule updates
#[derive(Debug, Clone)]
pub struct SpikingNodes {
    shape: Vec<usize>,
    batch_size: usize,
    capabilities: NodeCapabilities,
    spikes: ArrayD<f32>,
    trace: Option<ArrayD<f32>>,
    negative_trace: Option<ArrayD<f32>>,
    firing_probability: Option<ArrayD<f32>>,
}

impl SpikingNodes {
    pub fn new(shape: &[usize], batch_size: usize) -> PlasticityResult<Self> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(PlasticityError::InvalidPopulation(format!(
                "shape {:?} must be non-empty with positive dimensions",
                shape
            )));
        }
        if batch_size == 0 {
            return Err(PlasticityError::InvalidPopulation(
                "batch size must be at least 1".to_string(),
            ));
        }
        let dims: Vec<usize> = std::iter::once(batch_size).chain(shape.iter().copied()).collect();
        Ok(Self {
            shape: shape.to_vec(),
            batch_size,
            capabilities: NodeCapabilities::default(),
            spikes: ArrayD::zeros(dims),
            trace: None,
            negative_trace: None,
            firing_probability: None,
        })
    }

    /// Record spike traces
    pub fn with_traces(mut self, additive: bool) -> Self {
        self.capabilities.traces = true;
        self.capabilities.traces_additive = additive;
        self.trace = Some(self.zeros());
        self
    }

    pub fn with_negative_traces(mut self) -> Self {
        self.capabilities.negative_traces = true;
        self.negative_trace = Some(self.zeros());
        self
    }

    /// Fire stochastically and expose the firing probability
    pub fn stochastic(mut self) -> Self {
        self.capabilities.stochastic = true;
        self.firing_probability = Some(self.zeros());
        self
    }

    fn dims(&self) -> Vec<usize> {
        std::iter::once(self.batch_size).chain(self.shape.iter().copied()).collect()
    }

    fn zeros(&self) -> ArrayD<f32> {
        ArrayD::zeros(self.dims())
    }

    fn check(&self, what: &str, values: &ArrayD<f32>) -> PlasticityResult<()> {
        let expected = self.dims();
        if values.shape() != expected.as_slice() {
            return Err(PlasticityError::shape_mismatch(what, &expected, values.shape()));
        }
        Ok(())
    }

    pub fn set_spikes(&mut self, spikes: ArrayD<f32>) -> PlasticityResult<()> {
        self.check("spikes", &spikes)?;
        self.spikes = spikes;
        Ok(())
    }

    pub fn set_trace(&mut self, trace: ArrayD<f32>) -> PlasticityResult<()> {
        if !self.capabilities.traces {
            return Err(PlasticityError::InvalidPopulation("trace recording is disabled".to_string()));
        }
        self.check("trace", &trace)?;
        self.trace = Some(trace);
        Ok(())
    }

    pub fn set_negative_trace(&mut self, trace: ArrayD<f32>) -> PlasticityResult<()> {
        if !self.capabilities.negative_traces {
            return Err(PlasticityError::InvalidPopulation(
                "negative trace recording is disabled".to_string(),
            ));
        }
        self.check("negative trace", &trace)?;
        self.negative_trace = Some(trace);
        Ok(())
    }

    pub fn set_firing_probability(&mut self, probability: ArrayD<f32>) -> PlasticityResult<()> {
        if !self.capabilities.stochastic {
            return Err(PlasticityError::InvalidPopulation("population is not stochastic".to_string()));
        }
        self.check("firing probability", &probability)?;
        self.firing_probability = Some(probability);
        Ok(())
    }
}

impl NodePopulation for SpikingNodes {
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn spikes(&self) -> ArrayViewD<'_, f32> {
        self.spikes.view()
    }

    fn trace(&self) -> Option<ArrayViewD<'_, f32>> {
        self.trace.as_ref().map(|t| t.view())
    }

    fn negative_trace(&self) -> Option<ArrayViewD<'_, f32>> {
        self.negative_trace.as_ref().map(|t| t.view())
    }

    fn firing_probability(&self) -> Option<ArrayViewD<'_, f32>> {
        self.firing_probability.as_ref().map(|t| t.view())
    }

    fn capabilities(&self) -> NodeCapabilities {
        self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_allocates_state() {
        let nodes = SpikingNodes::new(&[2, 3], 4).unwrap().with_traces(true).stochastic();
        assert_eq!(nodes.n(), 6);
        assert_eq!(nodes.spikes().shape(), &[4, 2, 3]);
        assert_eq!(nodes.trace().unwrap().shape(), &[4, 2, 3]);
        assert!(nodes.negative_trace().is_none());
        let caps = nodes.capabilities();
        assert!(caps.traces && caps.traces_additive && caps.stochastic && !caps.negative_traces);
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(SpikingNodes::new(&[], 1).is_err());
        assert!(SpikingNodes::new(&[3, 0], 1).is_err());
        assert!(SpikingNodes::new(&[3], 0).is_err());
    }

    #[test]
    fn test_setters_validate() {
        let mut nodes = SpikingNodes::new(&[3], 1).unwrap();
        assert!(nodes.set_spikes(ArrayD::ones(vec![1, 3])).is_ok());
        assert!(matches!(
            nodes.set_spikes(ArrayD::ones(vec![3])),
            Err(PlasticityError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            nodes.set_trace(ArrayD::ones(vec![1, 3])),
            Err(PlasticityError::InvalidPopulation(_))
        ));
    }
}
