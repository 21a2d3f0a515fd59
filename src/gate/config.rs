// Configuration for the monitorability gate

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Usability thresholds for a single channel
///
/// # Example
/// ```
/// use oraclegate::gate::GateConfig;
///
/// let config = GateConfig::default();
/// assert_eq!(config.fpr_cap, 0.05);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum tolerated false-positive rate for a usable alarm
    pub fpr_cap: f64,

    /// Amount by which measured holdout FPR may exceed the cap
    pub tolerance: f64,

    /// Minimum true-positive rate at the cap
    pub min_tpr: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            fpr_cap: 0.05,
            tolerance: 0.02,
            min_tpr: 0.2,
        }
    }
}

impl GateConfig {
    /// Tight cap, no slack, high detection floor
    pub fn strict() -> Self {
        Self {
            fpr_cap: 0.01,
            tolerance: 0.0,
            min_tpr: 0.5,
        }
    }

    /// Loose cap for early, exploratory runs
    pub fn permissive() -> Self {
        Self {
            fpr_cap: 0.1,
            tolerance: 0.05,
            min_tpr: 0.1,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.fpr_cap) {
            return Err(ConfigError::Invalid(format!(
                "gate.fpr_cap must be in [0, 1], got {}",
                self.fpr_cap
            )));
        }

        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(ConfigError::Invalid(format!(
                "gate.tolerance must be in [0, 1], got {}",
                self.tolerance
            )));
        }

        if !(0.0..=1.0).contains(&self.min_tpr) {
            return Err(ConfigError::Invalid(format!(
                "gate.min_tpr must be in [0, 1], got {}",
                self.min_tpr
            )));
        }

        Ok(())
    }
}
