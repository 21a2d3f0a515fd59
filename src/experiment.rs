//! Seed sweeps comparing a policy against the random-ranking baseline
//!
//! Each seed string re-keys the holdout split, the validation split, and
//! every ranking tie-break. A seed's outcome is the run's learning-curve
//! score: the mean over rounds 1..n of the weakest channel's TPR at the FPR
//! cap. The per-seed scores of both arms go to the robustness aggregator.

use crate::acquisition::AcquisitionRun;
use crate::config::RunConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::policy::RankingMode;
use crate::robustness::{assess_robustness, RobustnessAssessment, RobustnessConfig};
use serde::{Deserialize, Serialize};

/// Per-seed scores of both arms and the verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub seeds: Vec<String>,
    pub policy_scores: Vec<f64>,
    pub baseline_scores: Vec<f64>,
    pub assessment: RobustnessAssessment,
}

/// `count` seed strings derived from `base`
///
/// # Example
/// ```
/// use oraclegate::experiment::derive_seeds;
///
/// assert_eq!(derive_seeds("test-seed", 2), vec!["test-seed-0", "test-seed-1"]);
/// ```
pub fn derive_seeds(base: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}-{}", base, i)).collect()
}

/// Same run configuration with random ranking
pub fn baseline_config(config: &RunConfig) -> RunConfig {
    RunConfig {
        ranking: RankingMode::Random,
        ..config.clone()
    }
}

/// Run the configured policy and the random baseline once per seed
pub fn run_seed_sweep(
    dataset: &Dataset,
    config: &RunConfig,
    seeds: &[String],
    robustness: &RobustnessConfig,
) -> Result<SweepOutcome> {
    let baseline = baseline_config(config);

    let mut policy_scores = Vec::with_capacity(seeds.len());
    let mut baseline_scores = Vec::with_capacity(seeds.len());

    for seed in seeds {
        let policy_score = AcquisitionRun::new(dataset, config.with_seed(seed.as_str()))?
            .run()?
            .learning_curve_score();
        let baseline_score = AcquisitionRun::new(dataset, baseline.with_seed(seed.as_str()))?
            .run()?
            .learning_curve_score();

        tracing::info!(
            seed = %seed,
            policy = policy_score,
            baseline = baseline_score,
            "seed finished"
        );

        policy_scores.push(policy_score);
        baseline_scores.push(baseline_score);
    }

    let assessment = assess_robustness(&policy_scores, &baseline_scores, robustness)?;

    Ok(SweepOutcome {
        seeds: seeds.to_vec(),
        policy_scores,
        baseline_scores,
        assessment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robustness::RobustnessVerdict;
    use crate::synthetic::{generate, SyntheticConfig};

    fn quick_config() -> RunConfig {
        RunConfig {
            rounds: 3,
            budget_per_oracle: 30,
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_baseline_config_only_changes_ranking() {
        let config = quick_config();
        let baseline = baseline_config(&config);
        assert_eq!(baseline.ranking, RankingMode::Random);
        assert_eq!(baseline.allocation, config.allocation);
        assert_eq!(baseline.budget_per_oracle, config.budget_per_oracle);
    }

    #[test]
    fn test_sweep_scores_every_seed() {
        let dataset = generate(&SyntheticConfig {
            n_items: 150,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let seeds = derive_seeds("sweep", 3);

        let outcome =
            run_seed_sweep(&dataset, &quick_config(), &seeds, &RobustnessConfig::default())
                .unwrap();

        assert_eq!(outcome.policy_scores.len(), 3);
        assert_eq!(outcome.baseline_scores.len(), 3);
        assert!(outcome
            .policy_scores
            .iter()
            .chain(&outcome.baseline_scores)
            .all(|s| (0.0..=1.0).contains(s)));
        // three seeds is below the default minimum
        assert!(matches!(
            outcome.assessment.verdict,
            RobustnessVerdict::InsufficientData { .. }
        ));
    }

    #[test]
    fn test_sweep_is_reproducible() {
        let dataset = generate(&SyntheticConfig {
            n_items: 120,
            ..SyntheticConfig::default()
        })
        .unwrap();
        let seeds = derive_seeds("repro", 2);
        let robustness = RobustnessConfig::permissive();

        let a = run_seed_sweep(&dataset, &quick_config(), &seeds, &robustness).unwrap();
        let b = run_seed_sweep(&dataset, &quick_config(), &seeds, &robustness).unwrap();
        assert_eq!(a, b);
    }
}
