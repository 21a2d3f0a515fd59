// Per-channel models refit every round on the labels acquired so far
//
// Each oracle channel owns a classifier (alarm score) and a ridge regressor
// on the oracle's continuous value. The regressor is the alternate proxy for
// the same decision boundary used by the coherence gate.

mod logistic;
mod ridge;
mod scaler;

pub use logistic::{sigmoid, LogisticModel};
pub use ridge::RidgeModel;
pub use scaler::Standardizer;

use crate::config::ConfigError;
use crate::error::{OracleGateError, Result};
use serde::{Deserialize, Serialize};

/// Classifier and regressor hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// L2 penalty on classifier weights
    pub l2: f64,
    /// Gradient-descent step size
    pub learning_rate: f64,
    /// Gradient-descent iterations per fit
    pub iterations: usize,
    /// Minimum labels per class before a channel counts as trained
    pub min_class_count: usize,
    /// Ridge penalty for the regressor
    pub ridge_lambda: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            l2: 0.01,
            learning_rate: 0.5,
            iterations: 300,
            min_class_count: 2,
            ridge_lambda: 1.0,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.l2 < 0.0 || self.ridge_lambda < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "penalties must be non-negative, got l2={} ridge_lambda={}",
                self.l2, self.ridge_lambda
            )));
        }

        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if self.iterations == 0 || self.min_class_count == 0 {
            return Err(ConfigError::Invalid(
                "iterations and min_class_count must be >= 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Score assigned by an untrained classifier
pub const UNTRAINED_SCORE: f64 = 0.5;

/// Models for one oracle channel at one round
#[derive(Debug, Clone, Default)]
pub struct ChannelModel {
    pub classifier: Option<LogisticModel>,
    pub regressor: Option<RidgeModel>,
    /// Why the classifier could not be fit, if it could not
    pub fit_error: Option<String>,
}

impl ChannelModel {
    /// Untrained channel (cold start)
    pub fn untrained() -> Self {
        Self::default()
    }

    /// Fit both models on the channel's training labels
    ///
    /// An insufficient-label condition yields an untrained channel rather
    /// than an error; other failures propagate.
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[bool],
        values: &[f64],
        config: &ModelConfig,
    ) -> Result<Self> {
        let classifier = match LogisticModel::fit(rows, labels, config) {
            Ok(model) => model,
            Err(e @ OracleGateError::InsufficientLabels { .. }) => {
                return Ok(Self {
                    classifier: None,
                    regressor: None,
                    fit_error: Some(e.to_string()),
                });
            }
            Err(e) => return Err(e),
        };

        let regressor = match RidgeModel::fit(rows, values, config.ridge_lambda) {
            Ok(model) => Some(model),
            Err(OracleGateError::SingularSystem) => {
                tracing::warn!("ridge regressor singular; alternate proxy unavailable");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            classifier: Some(classifier),
            regressor,
            fit_error: None,
        })
    }

    pub fn is_trained(&self) -> bool {
        self.classifier.is_some()
    }

    /// Classifier probability, or [`UNTRAINED_SCORE`]
    pub fn score(&self, row: &[f64]) -> Result<f64> {
        match &self.classifier {
            Some(model) => model.predict_proba(row),
            None => Ok(UNTRAINED_SCORE),
        }
    }

    /// Regressor prediction, or 0 when unavailable
    pub fn regress(&self, row: &[f64]) -> Result<f64> {
        match &self.regressor {
            Some(model) => model.predict(row),
            None => Ok(0.0),
        }
    }
}
