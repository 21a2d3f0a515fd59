// Closed-form ridge regression on standardized features
//
// Predicts an oracle's continuous value, which the coherence gate thresholds
// as a second proxy for the same alarm boundary. The normal equations
// (XᵀX + λI) w = Xᵀ(y - ȳ) are solved by Gaussian elimination with partial
// pivoting, and the intercept ȳ is left unpenalized.

use super::logistic::dot;
use super::scaler::Standardizer;
use crate::error::{OracleGateError, Result};
use serde::{Deserialize, Serialize};

/// Fitted ridge regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeModel {
    scaler: Standardizer,
    weights: Vec<f64>,
    intercept: f64,
}

impl RidgeModel {
    /// Fit on raw rows and continuous targets
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], lambda: f64) -> Result<Self> {
        if rows.len() != targets.len() {
            return Err(OracleGateError::DimensionMismatch {
                expected: rows.len(),
                actual: targets.len(),
            });
        }

        let scaler = Standardizer::fit(rows)?;
        let xs = scaler.transform_all(rows)?;
        let width = scaler.width();
        let intercept = targets.iter().sum::<f64>() / targets.len() as f64;

        let mut gram = vec![vec![0.0; width]; width];
        let mut rhs = vec![0.0; width];
        for (x, y) in xs.iter().zip(targets) {
            let centered = y - intercept;
            for i in 0..width {
                rhs[i] += x[i] * centered;
                for j in 0..width {
                    gram[i][j] += x[i] * x[j];
                }
            }
        }
        for (i, row) in gram.iter_mut().enumerate() {
            row[i] += lambda;
        }

        let weights = solve(gram, rhs)?;

        Ok(Self {
            scaler,
            weights,
            intercept,
        })
    }

    /// Predicted value for a raw row
    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        let x = self.scaler.transform(row)?;
        Ok(dot(&self.weights, &x) + self.intercept)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(OracleGateError::SingularSystem)?;
        if a[pivot][col].abs() < 1e-12 {
            return Err(OracleGateError::SingularSystem);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    Ok(x)
}
