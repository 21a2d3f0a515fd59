// Bootstrap interval and tail statistics over per-seed outcomes
//
// Means go through trueno::Vector and quantiles through aprender's
// DescriptiveStats (R-7 interpolation). Both work in f32, so values are
// narrowed on the way in and widened on the way out.

use crate::splitter::seeded_hash;
use aprender::stats::DescriptiveStats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use trueno::Vector;

/// Percentile bootstrap interval on `mean(policy) - mean(baseline)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapInterval {
    /// Observed difference of means
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub confidence: f64,
    pub n_resamples: usize,
}

impl BootstrapInterval {
    pub fn excludes_zero(&self) -> bool {
        self.lower > 0.0 || self.upper < 0.0
    }
}

fn to_vector(values: &[f64]) -> Vector<f32> {
    let narrowed: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Vector::from_slice(&narrowed)
}

/// Arithmetic mean (`None` when empty)
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    to_vector(values).mean().ok().map(f64::from)
}

/// Linear-interpolated (R-7) percentile, `q` in `[0, 1]`
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let vector = to_vector(values);
    DescriptiveStats::new(&vector)
        .quantile(q.clamp(0.0, 1.0))
        .ok()
        .map(f64::from)
}

/// Conditional value at risk: mean of the worst `ceil(alpha * n)` values
///
/// Lower values are worse. At least one value is always averaged.
///
/// # Example
/// ```
/// use oraclegate::robustness::cvar;
///
/// let worst_half = cvar(&[0.1, 0.5, 0.9, 0.3], 0.5).unwrap();
/// assert!((worst_half - 0.2).abs() < 1e-6);
/// assert_eq!(cvar(&[], 0.5), None);
/// ```
pub fn cvar(values: &[f64], alpha: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let k = ((alpha.clamp(0.0, 1.0) * sorted.len() as f64 - 1e-9).ceil() as usize)
        .clamp(1, sorted.len());
    mean(&sorted[..k])
}

/// Bootstrap the difference of means with independent resampling
///
/// Both samples are resampled with replacement at their own size on every
/// iteration. The RNG is seeded from `seed`, so the interval is
/// reproducible. `None` when either sample is empty.
pub fn bootstrap_mean_difference(
    policy: &[f64],
    baseline: &[f64],
    n_resamples: usize,
    confidence: f64,
    seed: &str,
) -> Option<BootstrapInterval> {
    let estimate = mean(policy)? - mean(baseline)?;
    let mut rng = StdRng::seed_from_u64(seeded_hash(seed, "bootstrap", "rng"));

    let diffs: Vec<f64> = (0..n_resamples.max(1))
        .map(|_| resampled_mean(policy, &mut rng) - resampled_mean(baseline, &mut rng))
        .collect();

    let tail = (1.0 - confidence) / 2.0;
    let interval = BootstrapInterval {
        estimate,
        lower: percentile(&diffs, tail)?,
        upper: percentile(&diffs, 1.0 - tail)?,
        confidence,
        n_resamples: diffs.len(),
    };

    tracing::debug!(
        estimate = interval.estimate,
        lower = interval.lower,
        upper = interval.upper,
        "bootstrap interval"
    );

    Some(interval)
}

fn resampled_mean(values: &[f64], rng: &mut StdRng) -> f64 {
    let n = values.len();
    let total: f64 = (0..n).map(|_| values[rng.gen_range(0..n)]).sum();
    total / n as f64
}
