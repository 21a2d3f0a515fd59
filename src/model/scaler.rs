// Column standardization fitted on training rows only
//
// Fitting goes through aprender's StandardScaler on an f32 matrix. The fitted
// means and deviations are widened back to f64 and applied row by row, so
// scoring a single candidate never builds a matrix.

use crate::error::{OracleGateError, Result};
use aprender::preprocessing::StandardScaler;
use aprender::primitives::Matrix;
use aprender::traits::Transformer;
use serde::{Deserialize, Serialize};

// Deviations below this (in f32) are treated as a constant column
const MIN_STD: f64 = 1e-6;

/// Per-column mean / population standard deviation scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl Standardizer {
    /// Fit on rows of equal width
    ///
    /// A constant column gets std 1 so it maps to zero instead of NaN.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let first = rows.first().ok_or(OracleGateError::EmptyDataset)?;
        let width = first.len();

        let mut data = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(OracleGateError::DimensionMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            data.extend(row.iter().map(|&v| v as f32));
        }

        if width == 0 {
            return Ok(Self::identity(0));
        }

        let matrix = Matrix::from_vec(rows.len(), width, data)
            .map_err(|e| OracleGateError::Preprocessing(e.to_string()))?;

        let mut scaler = StandardScaler::new().with_mean(true).with_std(true);
        scaler
            .fit(&matrix)
            .map_err(|e| OracleGateError::Preprocessing(e.to_string()))?;

        let means = scaler.mean().iter().map(|&m| f64::from(m)).collect();
        let stds = scaler
            .std()
            .iter()
            .map(|&s| {
                let s = f64::from(s);
                if s > MIN_STD {
                    s
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { means, stds })
    }

    /// Identity scaler of the given width
    pub fn identity(width: usize) -> Self {
        Self {
            means: vec![0.0; width],
            stds: vec![1.0; width],
        }
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    /// Standardize one row
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(OracleGateError::DimensionMismatch {
                expected: self.width(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((v, m), s)| (v - m) / s)
            .collect())
    }

    /// Standardize many rows
    pub fn transform_all(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_transform_zero_mean_unit_variance() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 20.0], vec![5.0, 30.0]];
        let scaler = Standardizer::fit(&rows).unwrap();
        assert!((scaler.means()[0] - 3.0).abs() < 1e-5);
        assert!((scaler.means()[1] - 20.0).abs() < 1e-4);

        let transformed = scaler.transform_all(&rows).unwrap();
        for col in 0..2 {
            let mean: f64 = transformed.iter().map(|r| r[col]).sum::<f64>() / 3.0;
            let var: f64 = transformed.iter().map(|r| r[col] * r[col]).sum::<f64>() / 3.0;
            assert!(mean.abs() < 1e-5, "column {} mean {}", col, mean);
            assert!((var - 1.0).abs() < 1e-4, "column {} variance {}", col, var);
        }
    }

    #[test]
    fn test_constant_column() {
        let rows = vec![vec![2.0], vec![2.0]];
        let scaler = Standardizer::fit(&rows).unwrap();
        assert_eq!(scaler.stds(), &[1.0]);
        assert!(scaler.transform(&[2.0]).unwrap()[0].abs() < 1e-6);
    }

    #[test]
    fn test_constant_column_beside_varying_one() {
        let rows = vec![vec![0.1, 7.5], vec![0.4, 7.5], vec![0.7, 7.5], vec![1.0, 7.5]];
        let scaler = Standardizer::fit(&rows).unwrap();
        assert_eq!(scaler.stds()[1], 1.0);
        assert!(scaler.stds()[0] > 0.1);

        for row in scaler.transform_all(&rows).unwrap() {
            assert!(row.iter().all(|v| v.is_finite()));
            assert!(row[1].abs() < 1e-5);
        }
    }

    #[test]
    fn test_fitted_on_training_rows_only() {
        let train = vec![vec![0.0], vec![2.0]];
        let scaler = Standardizer::fit(&train).unwrap();
        // A far-away candidate is scaled by the training statistics
        let z = scaler.transform(&[11.0]).unwrap()[0];
        assert!((z - 10.0).abs() < 1e-4, "got {}", z);
    }

    #[test]
    fn test_empty_and_ragged_rejected() {
        assert!(Standardizer::fit(&[]).is_err());
        assert!(Standardizer::fit(&[vec![1.0, 2.0], vec![1.0]]).is_err());
        let scaler = Standardizer::identity(2);
        assert!(scaler.transform(&[1.0]).is_err());
    }
}
