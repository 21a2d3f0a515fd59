// Robustness verdict: bootstrap interval plus CVaR tail gate
//
// The verdict is decided in this order:
// - too few seeds on either side: insufficient data
// - policy tail worse than baseline tail beyond tolerance: tail-risk violation
// - interval entirely above zero: outperforms random
// - interval entirely below zero: underperforms
// - otherwise: inconclusive

use crate::config::ConfigError;
use crate::robustness::config::RobustnessConfig;
use crate::robustness::statistics::{bootstrap_mean_difference, cvar, mean, BootstrapInterval};
use serde::{Deserialize, Serialize};

// Means and quantiles are computed in f32
const TAIL_EPSILON: f64 = 1e-6;

/// Final verdict for a policy-vs-random comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum RobustnessVerdict {
    /// Interval on the mean difference lies entirely above zero
    OutperformsRandom,

    /// Interval contains zero
    Inconclusive,

    /// Interval lies entirely below zero
    Underperforms,

    /// Policy's worst seeds are worse than the baseline's beyond tolerance
    TailRiskViolation,

    /// Not enough seeds to make a determination
    InsufficientData { reason: String },
}

/// Detailed robustness assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessAssessment {
    /// Final verdict
    pub verdict: RobustnessVerdict,

    /// Bootstrap interval (absent when data is insufficient)
    pub interval: Option<BootstrapInterval>,

    pub policy_mean: Option<f64>,
    pub baseline_mean: Option<f64>,
    pub policy_cvar: Option<f64>,
    pub baseline_cvar: Option<f64>,

    pub n_policy: usize,
    pub n_baseline: usize,

    /// Configuration used for assessment
    pub config: RobustnessConfig,
}

impl RobustnessAssessment {
    /// Whether the policy may be reported as better than random
    pub fn is_robust_improvement(&self) -> bool {
        self.verdict == RobustnessVerdict::OutperformsRandom
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        match &self.verdict {
            RobustnessVerdict::OutperformsRandom => {
                report.push_str("✅ POLICY OUTPERFORMS RANDOM\n\n");
            }
            RobustnessVerdict::Inconclusive => {
                report.push_str("➖ INCONCLUSIVE (interval contains zero)\n\n");
            }
            RobustnessVerdict::Underperforms => {
                report.push_str("❌ POLICY UNDERPERFORMS RANDOM\n\n");
            }
            RobustnessVerdict::TailRiskViolation => {
                report.push_str("❌ TAIL RISK VIOLATION\n\n");
                report.push_str(&format!(
                    "CVaR tolerance: {} (alpha={})\n",
                    self.config.cvar_tolerance, self.config.cvar_alpha
                ));
            }
            RobustnessVerdict::InsufficientData { reason } => {
                report.push_str("⚠️  INSUFFICIENT DATA\n\n");
                report.push_str(&format!("Reason: {}\n", reason));
            }
        }

        report.push_str(&format!(
            "Seeds: policy={}, baseline={}\n",
            self.n_policy, self.n_baseline
        ));

        if let (Some(p), Some(b)) = (self.policy_mean, self.baseline_mean) {
            report.push_str(&format!("Mean: policy={:.4}, baseline={:.4}\n", p, b));
        }

        if let (Some(p), Some(b)) = (self.policy_cvar, self.baseline_cvar) {
            report.push_str(&format!("CVaR: policy={:.4}, baseline={:.4}\n", p, b));
        }

        if let Some(interval) = &self.interval {
            report.push_str(&format!(
                "\n📊 Bootstrap ({} resamples, {:.0}% interval):\n",
                interval.n_resamples,
                interval.confidence * 100.0
            ));
            report.push_str(&format!(
                "  difference={:.4} [{:.4}, {:.4}]\n",
                interval.estimate, interval.lower, interval.upper
            ));
        }

        report
    }
}

/// Compare per-seed policy outcomes against the random baseline
///
/// Higher outcomes are better.
///
/// # Example
/// ```
/// use oraclegate::robustness::{assess_robustness, RobustnessConfig, RobustnessVerdict};
///
/// let policy = [0.80, 0.82, 0.79, 0.81, 0.83];
/// let baseline = [0.50, 0.52, 0.49, 0.51, 0.53];
///
/// let assessment = assess_robustness(&policy, &baseline, &RobustnessConfig::default()).unwrap();
/// assert_eq!(assessment.verdict, RobustnessVerdict::OutperformsRandom);
/// ```
pub fn assess_robustness(
    policy: &[f64],
    baseline: &[f64],
    config: &RobustnessConfig,
) -> Result<RobustnessAssessment, ConfigError> {
    config.validate()?;

    let mut assessment = RobustnessAssessment {
        verdict: RobustnessVerdict::Inconclusive,
        interval: None,
        policy_mean: mean(policy),
        baseline_mean: mean(baseline),
        policy_cvar: cvar(policy, config.cvar_alpha),
        baseline_cvar: cvar(baseline, config.cvar_alpha),
        n_policy: policy.len(),
        n_baseline: baseline.len(),
        config: config.clone(),
    };

    if policy.len() < config.min_seeds || baseline.len() < config.min_seeds {
        assessment.verdict = RobustnessVerdict::InsufficientData {
            reason: format!(
                "need at least {} seeds per side, got policy={} baseline={}",
                config.min_seeds,
                policy.len(),
                baseline.len()
            ),
        };
        return Ok(assessment);
    }

    assessment.interval = bootstrap_mean_difference(
        policy,
        baseline,
        config.n_resamples,
        config.confidence,
        &config.seed,
    );

    let tail_violation = match (assessment.policy_cvar, assessment.baseline_cvar) {
        (Some(p), Some(b)) => p < b - config.cvar_tolerance - TAIL_EPSILON,
        _ => false,
    };

    assessment.verdict = match &assessment.interval {
        _ if tail_violation => RobustnessVerdict::TailRiskViolation,
        Some(interval) if interval.lower > 0.0 => RobustnessVerdict::OutperformsRandom,
        Some(interval) if interval.upper < 0.0 => RobustnessVerdict::Underperforms,
        _ => RobustnessVerdict::Inconclusive,
    };

    tracing::info!(
        verdict = ?assessment.verdict,
        n_policy = policy.len(),
        n_baseline = baseline.len(),
        "robustness assessed"
    );

    Ok(assessment)
}
