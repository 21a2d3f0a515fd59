// Configuration for the seed-sweep robustness verdict

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Bootstrap and tail-risk settings
///
/// # Example
/// ```
/// use oraclegate::robustness::RobustnessConfig;
///
/// let config = RobustnessConfig::default();
/// assert_eq!(config.confidence, 0.95);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustnessConfig {
    /// Bootstrap resamples
    pub n_resamples: usize,

    /// Two-sided confidence level of the percentile interval
    pub confidence: f64,

    /// Fraction of worst seeds averaged by CVaR
    ///
    /// With `n` seeds the worst `ceil(cvar_alpha * n)` values are averaged
    /// (at least one).
    pub cvar_alpha: f64,

    /// How far the policy's CVaR may sit below the baseline's
    pub cvar_tolerance: f64,

    /// Seeds required on each side before any verdict other than
    /// insufficient data
    pub min_seeds: usize,

    /// Seed string for the bootstrap RNG
    pub seed: String,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            n_resamples: 2000,
            confidence: 0.95,
            cvar_alpha: 0.2,
            cvar_tolerance: 0.05,
            min_seeds: 5,
            seed: "robustness".to_string(),
        }
    }
}

impl RobustnessConfig {
    /// Wider interval, no tail slack
    pub fn strict() -> Self {
        Self {
            n_resamples: 5000,
            confidence: 0.99,
            cvar_alpha: 0.2,
            cvar_tolerance: 0.0,
            min_seeds: 10,
            ..Self::default()
        }
    }

    /// Narrower interval, more tail slack, fewer seeds
    pub fn permissive() -> Self {
        Self {
            n_resamples: 1000,
            confidence: 0.90,
            cvar_alpha: 0.25,
            cvar_tolerance: 0.1,
            min_seeds: 3,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_resamples == 0 {
            return Err(ConfigError::Invalid(
                "n_resamples must be >= 1".to_string(),
            ));
        }

        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "confidence must be in (0, 1), got {}",
                self.confidence
            )));
        }

        if !(self.cvar_alpha > 0.0 && self.cvar_alpha <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "cvar_alpha must be in (0, 1], got {}",
                self.cvar_alpha
            )));
        }

        if self.cvar_tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cvar_tolerance must be non-negative, got {}",
                self.cvar_tolerance
            )));
        }

        if self.min_seeds < 2 {
            return Err(ConfigError::Invalid(format!(
                "min_seeds must be >= 2, got {}",
                self.min_seeds
            )));
        }

        Ok(())
    }
}
