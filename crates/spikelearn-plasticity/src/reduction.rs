// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Batch reduction of per-sample weight updates.

use std::fmt;
use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD, Axis};
use spikelearn_config::ReductionKind;

use crate::error::{PlasticityError, PlasticityResult};

/// User supplied reduction over the leading (batch) axis
pub type ReductionFn = dyn Fn(ArrayViewD<'_, f32>) -> ArrayD<f32> + Send + Sync;

/// Collapses a `[batch, ...]` update tensor along the batch axis
#[derive(Clone, Default)]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
    Custom(Arc<ReductionFn>),
}

impl Reduction {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(ArrayViewD<'_, f32>) -> ArrayD<f32> + Send + Sync + 'static,
    {
        Reduction::Custom(Arc::new(f))
    }

    pub fn reduce(&self, update: ArrayViewD<'_, f32>) -> ArrayD<f32> {
        match self {
            Reduction::Mean => update
                .mean_axis(Axis(0))
                .unwrap_or_else(|| ArrayD::zeros(update.shape()[1..].to_vec())),
            Reduction::Sum => update.sum_axis(Axis(0)),
            Reduction::Custom(f) => f(update),
        }
    }

    /// Reduce and check the result against the expected shape
    pub(crate) fn reduce_to(
        &self,
        update: ArrayViewD<'_, f32>,
        expected: &[usize],
    ) -> PlasticityResult<ArrayD<f32>> {
        let reduced = self.reduce(update);
        if reduced.shape() != expected {
            return Err(PlasticityError::shape_mismatch(
                "batch-reduced update",
                expected,
                reduced.shape(),
            ));
        }
        Ok(reduced)
    }
}

impl From<ReductionKind> for Reduction {
    fn from(kind: ReductionKind) -> Self {
        match kind {
            ReductionKind::Mean => Reduction::Mean,
            ReductionKind::Sum => Reduction::Sum,
        }
    }
}

impl fmt::Debug for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::Mean => f.write_str("Mean"),
            Reduction::Sum => f.write_str("Sum"),
            Reduction::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mean_and_sum() {
        let update = array![[1.0_f32, 2.0], [3.0, 6.0]].into_dyn();
        assert_eq!(Reduction::Mean.reduce(update.view()), array![2.0_f32, 4.0].into_dyn());
        assert_eq!(Reduction::Sum.reduce(update.view()), array![4.0_f32, 8.0].into_dyn());
    }

    #[test]
    fn test_custom_reduction() {
        let max = Reduction::custom(|u| u.fold_axis(Axis(0), f32::MIN, |a, &b| a.max(b)));
        let update = array![[1.0_f32, 7.0], [3.0, 6.0]].into_dyn();
        assert_eq!(max.reduce(update.view()), array![3.0_f32, 7.0].into_dyn());
    }

    #[test]
    fn test_reduce_to_rejects_wrong_shape() {
        let keep_batch = Reduction::custom(|u| u.to_owned());
        let update = array![[1.0_f32, 2.0]].into_dyn();
        let err = keep_batch.reduce_to(update.view(), &[2]).unwrap_err();
        assert!(matches!(err, PlasticityError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_from_kind() {
        assert!(matches!(Reduction::from(ReductionKind::Sum), Reduction::Sum));
        assert_eq!(format!("{:?}", Reduction::default()), "Mean");
    }
}
