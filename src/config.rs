//! Run configuration for the acquisition loop
//!
//! A run is fully described by a [`RunConfig`]: the seed string, round
//! schedule, per-oracle budget, split fractions, policy, model
//! hyperparameters, and the gate/event/coherence settings. Configurations
//! load from TOML and validate before any round runs.

use crate::events::EventConfig;
use crate::gate::GateConfig;
use crate::model::ModelConfig;
use crate::policy::{AllocationMode, CompositeWeights, RankingMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to read configuration file {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Full configuration of a single acquisition run
///
/// # Example
/// ```
/// use oraclegate::config::RunConfig;
///
/// let config = RunConfig::default();
/// assert_eq!(config.seed, "test-seed");
/// assert_eq!(config.budget_per_oracle, 50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed string keying every hash-based split and ranking tie-break
    pub seed: String,

    /// Number of acquisition rounds after the cold-start evaluation
    pub rounds: usize,

    /// Query capacity per oracle per round
    pub batch_size: usize,

    /// Total number of labels each oracle may be asked for
    pub budget_per_oracle: usize,

    /// Fraction of items held out for evaluation (never queried)
    pub holdout_fraction: f64,

    /// Fraction of acquired labels reserved for threshold calibration
    pub validation_fraction: f64,

    /// How the round capacity is divided between oracles
    pub allocation: AllocationMode,

    /// How candidates are ranked within an oracle's pool
    pub ranking: RankingMode,

    /// False-positive-rate targets reported for every channel
    pub fpr_targets: Vec<f64>,

    /// Rounds within which primary and alternate events must agree
    pub coherence_tolerance: usize,

    /// Weights for [`RankingMode::Composite`]
    pub composite_weights: CompositeWeights,

    /// Monitorability gate settings
    pub gate: GateConfig,

    /// Classifier and regressor hyperparameters
    pub model: ModelConfig,

    /// Sustained-jump detection settings
    pub event: EventConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: "test-seed".to_string(),
            rounds: 5,
            batch_size: 10,
            budget_per_oracle: 50,
            holdout_fraction: 0.3,
            validation_fraction: 0.3,
            allocation: AllocationMode::FixedSplit,
            ranking: RankingMode::Uncertainty,
            fpr_targets: vec![0.01, 0.05, 0.1],
            coherence_tolerance: 1,
            composite_weights: CompositeWeights::default(),
            gate: GateConfig::default(),
            model: ModelConfig::default(),
            event: EventConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parse a configuration from TOML; missing keys take default values
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Same configuration with a different seed string
    pub fn with_seed(&self, seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            ..self.clone()
        }
    }

    /// FPR targets plus the gate cap, sorted and deduplicated
    pub fn evaluation_targets(&self) -> Vec<f64> {
        let mut targets = self.fpr_targets.clone();
        targets.push(self.gate.fpr_cap);
        targets.sort_by(f64::total_cmp);
        targets.dedup();
        targets
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seed.is_empty() {
            return Err(ConfigError::Invalid("seed must not be empty".to_string()));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be >= 1".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(ConfigError::Invalid(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            )));
        }

        if !(0.0..1.0).contains(&self.validation_fraction) {
            return Err(ConfigError::Invalid(format!(
                "validation_fraction must be in [0, 1), got {}",
                self.validation_fraction
            )));
        }

        if let Some(bad) = self
            .fpr_targets
            .iter()
            .find(|t| !(0.0..=1.0).contains(*t))
        {
            return Err(ConfigError::Invalid(format!(
                "fpr_targets must be in [0, 1], got {}",
                bad
            )));
        }

        self.composite_weights.validate()?;
        self.gate.validate()?;
        self.model.validate()?;
        self.event.validate()?;

        Ok(())
    }
}
