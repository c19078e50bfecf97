// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Calibration table for weight-dependent STDP.
//!
//! A 101 x 120 grid of measured update magnitudes. Rows are indexed by the
//! weight expressed in percent of the learning-rate scale; columns by the
//! rounded spike-timing difference offset by 60.
//!
//! On-disk format: one row per line, whitespace separated decimals. Blank
//! lines are ignored.

use std::path::Path;
use std::str::FromStr;

use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Zip};
use tracing::debug;

use crate::error::{PlasticityError, PlasticityResult};

pub const CALIBRATION_ROWS: usize = 101;
pub const CALIBRATION_COLS: usize = 120;
/// Added to the rounded timing difference to obtain a column index
pub const DELTA_INDEX_OFFSET: f32 = 60.0;
/// Column used whenever the timing difference falls outside the table
pub const FALLBACK_COLUMN: usize = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    values: Array2<f32>,
}

impl CalibrationTable {
    pub fn from_array(values: Array2<f32>) -> PlasticityResult<Self> {
        if values.dim() != (CALIBRATION_ROWS, CALIBRATION_COLS) {
            return Err(PlasticityError::CalibrationShape {
                expected: (CALIBRATION_ROWS, CALIBRATION_COLS),
                actual: values.dim(),
            });
        }
        Ok(Self { values })
    }

    pub fn load(path: impl AsRef<Path>) -> PlasticityResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PlasticityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = content.parse::<Self>()?;
        debug!(target: "spikelearn_plasticity", path = %path.display(), "Loaded calibration table");
        Ok(table)
    }

    pub fn values(&self) -> ArrayView2<'_, f32> {
        self.values.view()
    }

    /// Row for a weight: `|round(weight / scale * 100)|`, before range checks.
    /// Ties go to the even row, so 12.5 selects row 12.
    pub fn weight_index(weight: f32, scale: f32) -> f32 {
        (weight / scale * 100.0).round_ties_even().abs()
    }

    /// Column for a timing difference; out-of-range and non-finite
    /// differences map to [`FALLBACK_COLUMN`].
    pub fn delta_column(delta: f32) -> Option<usize> {
        let index = delta.round() + DELTA_INDEX_OFFSET;
        if index.is_finite() && index >= 0.0 && index < CALIBRATION_COLS as f32 {
            Some(index as usize)
        } else {
            None
        }
    }

    /// Element-wise lookup of `table[row(w), column(delta)]`.
    ///
    /// Returns the looked-up magnitudes and how many deltas fell back to
    /// column 0. Errors if any weight maps beyond the last row.
    pub fn lookup(
        &self,
        weights: ArrayViewD<'_, f32>,
        scale: f32,
        deltas: ArrayViewD<'_, f32>,
    ) -> PlasticityResult<(ArrayD<f32>, usize)> {
        if weights.shape() != deltas.shape() {
            return Err(PlasticityError::shape_mismatch(
                "timing differences",
                weights.shape(),
                deltas.shape(),
            ));
        }

        // Validate every row before producing anything
        let max_row = CALIBRATION_ROWS - 1;
        let mut rows = ArrayD::<usize>::zeros(weights.raw_dim());
        for (row, &w) in rows.iter_mut().zip(weights.iter()) {
            let index = Self::weight_index(w, scale);
            if !index.is_finite() || index > max_row as f32 {
                return Err(PlasticityError::CalibrationIndex { index, max_row });
            }
            *row = index as usize;
        }

        let mut fallbacks = 0usize;
        let mut out = ArrayD::zeros(weights.raw_dim());
        Zip::from(&mut out)
            .and(&rows)
            .and(&deltas)
            .for_each(|out, &row, &delta| {
                let col = Self::delta_column(delta).unwrap_or_else(|| {
                    fallbacks += 1;
                    FALLBACK_COLUMN
                });
                *out = self.values[[row, col]];
            });

        Ok((out, fallbacks))
    }
}

impl FromStr for CalibrationTable {
    type Err = PlasticityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut data = Vec::with_capacity(CALIBRATION_ROWS * CALIBRATION_COLS);
        let mut rows = 0usize;

        for (line_no, line) in s.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = 0usize;
            for token in line.split_whitespace() {
                let value = token.parse::<f32>().map_err(|_| PlasticityError::CalibrationParse {
                    line: line_no + 1,
                    token: token.to_string(),
                })?;
                data.push(value);
                cols += 1;
            }
            if cols != CALIBRATION_COLS {
                return Err(PlasticityError::CalibrationShape {
                    expected: (CALIBRATION_ROWS, CALIBRATION_COLS),
                    actual: (rows + 1, cols),
                });
            }
            rows += 1;
        }

        if rows != CALIBRATION_ROWS {
            return Err(PlasticityError::CalibrationShape {
                expected: (CALIBRATION_ROWS, CALIBRATION_COLS),
                actual: (rows, CALIBRATION_COLS),
            });
        }

        let values = Array2::from_shape_vec((CALIBRATION_ROWS, CALIBRATION_COLS), data).map_err(|_| {
            PlasticityError::CalibrationShape {
                expected: (CALIBRATION_ROWS, CALIBRATION_COLS),
                actual: (rows, CALIBRATION_COLS),
            }
        })?;
        Ok(Self { values })
    }
}
