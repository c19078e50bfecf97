// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Tensor kernels used by the learning rules.
//!
//! Per-sample work is fanned out over the batch axis with rayon; each sample
//! result is written into its slot of the output tensor.

use ndarray::{Array2, Array3, ArrayD, ArrayView1, ArrayView2, ArrayView3, ArrayView4, ArrayViewD, Axis};
use rayon::prelude::*;

use crate::error::{PlasticityError, PlasticityResult};

/// Population activity tensor: `[batch, *shape]`
pub type Tensor = ArrayD<f32>;

/// `out[i, j] = u[i] * v[j]`
pub fn outer(u: ArrayView1<'_, f32>, v: ArrayView1<'_, f32>) -> Array2<f32> {
    Array2::from_shape_fn((u.len(), v.len()), |(i, j)| u[i] * v[j])
}

/// Per-sample outer products: `[B, m] x [B, n] -> [B, m, n]`
pub fn batched_outer(a: ArrayView2<'_, f32>, b: ArrayView2<'_, f32>) -> Array3<f32> {
    debug_assert_eq!(a.nrows(), b.nrows());
    let batch = a.nrows();

    let samples: Vec<Array2<f32>> = (0..batch)
        .into_par_iter()
        .map(|i| outer(a.row(i), b.row(i)))
        .collect();

    let mut out = Array3::zeros((batch, a.ncols(), b.ncols()));
    for (mut slot, sample) in out.outer_iter_mut().zip(samples.iter()) {
        slot.assign(sample);
    }
    out
}

/// Per-sample `a[i] · b[i]ᵀ`: `[B, p, L] x [B, q, L] -> [B, p, q]`
///
/// The contraction runs over the spatial axis `L`, which is how convolution
/// kernels accumulate correlations between patches and output channels.
pub fn batched_matmul_t(a: ArrayView3<'_, f32>, b: ArrayView3<'_, f32>) -> Array3<f32> {
    debug_assert_eq!(a.dim().0, b.dim().0);
    debug_assert_eq!(a.dim().2, b.dim().2);
    let (batch, p, _) = a.dim();
    let q = b.dim().1;

    let samples: Vec<Array2<f32>> = (0..batch)
        .into_par_iter()
        .map(|i| {
            let lhs = a.index_axis(Axis(0), i);
            let rhs = b.index_axis(Axis(0), i);
            Array2::from_shape_fn((p, q), |(r, c)| {
                lhs.row(r).iter().zip(rhs.row(c).iter()).map(|(x, y)| x * y).sum()
            })
        })
        .collect();

    let mut out = Array3::zeros((batch, p, q));
    for (mut slot, sample) in out.outer_iter_mut().zip(samples.iter()) {
        slot.assign(sample);
    }
    out
}

/// Output extent of a 2-D convolution along one axis
pub fn conv_output_size(input: usize, kernel: usize, padding: usize, stride: usize) -> Option<usize> {
    let padded = input + 2 * padding;
    if stride == 0 || kernel == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}

/// Extract sliding patches (im2col).
///
/// `[B, C, H, W] -> [B, C*kh*kw, L]` where `L = out_h * out_w`. Row index is
/// `c*kh*kw + ki*kw + kj`, matching a `[out, C, kh, kw]` kernel flattened to
/// `[out, C*kh*kw]`. Out-of-image taps read zero padding.
pub fn unfold(
    input: ArrayView4<'_, f32>,
    kernel: (usize, usize),
    padding: (usize, usize),
    stride: (usize, usize),
) -> PlasticityResult<Array3<f32>> {
    let (batch, channels, height, width) = input.dim();
    let (kh, kw) = kernel;
    let out_h = conv_output_size(height, kh, padding.0, stride.0).ok_or_else(|| {
        PlasticityError::InvalidGeometry(format!(
            "kernel height {} does not fit input height {} with padding {} and stride {}",
            kh, height, padding.0, stride.0
        ))
    })?;
    let out_w = conv_output_size(width, kw, padding.1, stride.1).ok_or_else(|| {
        PlasticityError::InvalidGeometry(format!(
            "kernel width {} does not fit input width {} with padding {} and stride {}",
            kw, width, padding.1, stride.1
        ))
    })?;

    let mut out = Array3::zeros((batch, channels * kh * kw, out_h * out_w));
    for b in 0..batch {
        for c in 0..channels {
            for ki in 0..kh {
                for kj in 0..kw {
                    let row = c * kh * kw + ki * kw + kj;
                    for oh in 0..out_h {
                        // Padded coordinate minus padding gives the image row
                        let ih = (oh * stride.0 + ki) as isize - padding.0 as isize;
                        if ih < 0 || ih >= height as isize {
                            continue;
                        }
                        for ow in 0..out_w {
                            let iw = (ow * stride.1 + kj) as isize - padding.1 as isize;
                            if iw < 0 || iw >= width as isize {
                                continue;
                            }
                            out[[b, row, oh * out_w + ow]] = input[[b, c, ih as usize, iw as usize]];
                        }
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Check a population tensor is `[batch, *shape]`
pub(crate) fn expect_shape(
    what: impl Into<String>,
    tensor: &ArrayViewD<'_, f32>,
    batch: usize,
    shape: &[usize],
) -> PlasticityResult<()> {
    let expected: Vec<usize> = std::iter::once(batch).chain(shape.iter().copied()).collect();
    if tensor.shape() != expected.as_slice() {
        return Err(PlasticityError::shape_mismatch(what, &expected, tensor.shape()));
    }
    Ok(())
}

/// Collapse `[batch, *shape]` into `[batch, n]`
pub(crate) fn flatten_batch(tensor: ArrayViewD<'_, f32>, batch: usize) -> PlasticityResult<Array2<f32>> {
    let n = if batch == 0 { 0 } else { tensor.len() / batch };
    let flat = tensor
        .to_shape((batch, n))
        .map_err(|_| PlasticityError::shape_mismatch("flattened activity", &[batch, n], tensor.shape()))?;
    Ok(flat.into_owned())
}

/// Collapse `[batch, channels, h, w]` into `[batch, channels, h*w]`
pub(crate) fn flatten_spatial(
    tensor: ArrayViewD<'_, f32>,
    batch: usize,
    channels: usize,
) -> PlasticityResult<Array3<f32>> {
    let locations = if batch * channels == 0 { 0 } else { tensor.len() / (batch * channels) };
    let flat = tensor.to_shape((batch, channels, locations)).map_err(|_| {
        PlasticityError::shape_mismatch("spatial activity", &[batch, channels, locations], tensor.shape())
    })?;
    Ok(flat.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array4};

    #[test]
    fn test_batched_outer() {
        let a = array![[1.0_f32, 2.0], [0.0, 1.0]];
        let b = array![[3.0_f32], [5.0]];
        let out = batched_outer(a.view(), b.view());
        assert_eq!(out.dim(), (2, 2, 1));
        assert_eq!(out[[0, 1, 0]], 6.0);
        assert_eq!(out[[1, 0, 0]], 0.0);
        assert_eq!(out[[1, 1, 0]], 5.0);
    }

    #[test]
    fn test_batched_matmul_t() {
        // p=1, q=2, L=3
        let a = array![[[1.0_f32, 2.0, 3.0]]];
        let b = array![[[1.0_f32, 0.0, 1.0], [0.0, 1.0, 0.0]]];
        let out = batched_matmul_t(a.view(), b.view());
        assert_eq!(out, array![[[4.0_f32, 2.0]]]);
    }

    #[test]
    fn test_conv_output_size() {
        assert_eq!(conv_output_size(5, 3, 0, 1), Some(3));
        assert_eq!(conv_output_size(5, 3, 1, 2), Some(3));
        assert_eq!(conv_output_size(2, 3, 0, 1), None);
        assert_eq!(conv_output_size(5, 3, 0, 0), None);
    }

    #[test]
    fn test_unfold_without_padding() {
        let input = Array4::from_shape_fn((1, 1, 3, 3), |(_, _, h, w)| (h * 3 + w) as f32);
        let patches = unfold(input.view(), (2, 2), (0, 0), (1, 1)).unwrap();
        assert_eq!(patches.dim(), (1, 4, 4));
        // First patch is the top-left 2x2 window
        assert_eq!(patches.slice(ndarray::s![0, .., 0]).to_vec(), vec![0.0, 1.0, 3.0, 4.0]);
        // Last patch is the bottom-right window
        assert_eq!(patches.slice(ndarray::s![0, .., 3]).to_vec(), vec![4.0, 5.0, 7.0, 8.0]);
    }

    #[test]
    fn test_unfold_zero_padding() {
        let input = Array4::from_elem((1, 1, 1, 1), 2.0_f32);
        let patches = unfold(input.view(), (3, 3), (1, 1), (1, 1)).unwrap();
        assert_eq!(patches.dim(), (1, 9, 1));
        assert_eq!(patches.sum(), 2.0);
        assert_eq!(patches[[0, 4, 0]], 2.0);
    }

    #[test]
    fn test_unfold_rejects_oversized_kernel() {
        let input = Array4::<f32>::zeros((1, 1, 2, 2));
        assert!(matches!(
            unfold(input.view(), (3, 3), (0, 0), (1, 1)),
            Err(PlasticityError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_flatten_batch() {
        let t = ArrayD::<f32>::zeros(vec![2, 3, 4]);
        assert_eq!(flatten_batch(t.view(), 2).unwrap().dim(), (2, 12));
    }
}
