// L2-regularized logistic regression trained by full-batch gradient descent
//
// Zero initialization and a fixed iteration count keep fits bit-for-bit
// reproducible for a given training set.

use super::scaler::Standardizer;
use super::ModelConfig;
use crate::error::{OracleGateError, Result};
use serde::{Deserialize, Serialize};

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Fitted binary classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    scaler: Standardizer,
    weights: Vec<f64>,
    bias: f64,
    /// Mean log-loss on the training set after the final iteration
    pub training_loss: f64,
}

impl LogisticModel {
    /// Fit on raw (unstandardized) rows
    ///
    /// Fails with `InsufficientLabels` when either class has fewer than
    /// `config.min_class_count` examples.
    pub fn fit(rows: &[Vec<f64>], labels: &[bool], config: &ModelConfig) -> Result<Self> {
        if rows.len() != labels.len() {
            return Err(OracleGateError::DimensionMismatch {
                expected: rows.len(),
                actual: labels.len(),
            });
        }

        let positives = labels.iter().filter(|&&l| l).count();
        let negatives = labels.len() - positives;
        let required = config.min_class_count.max(1);
        if positives < required || negatives < required {
            return Err(OracleGateError::InsufficientLabels {
                required,
                positives,
                negatives,
            });
        }

        let scaler = Standardizer::fit(rows)?;
        let xs = scaler.transform_all(rows)?;
        let ys: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let n = xs.len() as f64;
        let width = scaler.width();

        let mut weights = vec![0.0; width];
        let mut bias = 0.0;

        for _ in 0..config.iterations {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;

            for (x, y) in xs.iter().zip(&ys) {
                let p = sigmoid(dot(&weights, x) + bias);
                let err = p - y;
                for (g, v) in grad_w.iter_mut().zip(x) {
                    *g += err * v;
                }
                grad_b += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= config.learning_rate * (g / n + config.l2 * *w);
            }
            bias -= config.learning_rate * grad_b / n;
        }

        let training_loss = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| {
                let p = sigmoid(dot(&weights, x) + bias).clamp(1e-12, 1.0 - 1e-12);
                -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
            })
            .sum::<f64>()
            / n;

        Ok(Self {
            scaler,
            weights,
            bias,
            training_loss,
        })
    }

    /// Probability of the positive class for a raw row
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64> {
        let x = self.scaler.transform(row)?;
        Ok(sigmoid(dot(&self.weights, &x) + self.bias))
    }

    /// Weights in standardized feature space
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn scaler(&self) -> &Standardizer {
        &self.scaler
    }
}

pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
