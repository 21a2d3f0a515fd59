// Robustness aggregation across seeds
//
// A policy is compared against the random-ranking baseline on one scalar
// outcome per seed. The comparison has two parts:
//
// - a percentile bootstrap interval on the difference of means; the policy
//   outperforms only when the whole interval lies above zero
// - a CVaR tail gate: the mean of the policy's worst seeds may not fall
//   more than a tolerance below the baseline's worst seeds
//
// Resampling is driven by a seeded StdRng, so an assessment is reproducible.

mod config;
mod statistics;
mod verdict;

pub use config::RobustnessConfig;
pub use statistics::{bootstrap_mean_difference, cvar, mean, percentile, BootstrapInterval};
pub use verdict::{assess_robustness, RobustnessAssessment, RobustnessVerdict};
