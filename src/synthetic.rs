//! Seeded synthetic datasets with known linear decision boundaries
//!
//! Two oracle channels, `PAE` and `MSA`, each answer with a continuous value
//! `w·x + b + noise`; the label is positive above zero. Features are uniform
//! on `[-1, 1]`. The RNG is seeded from `seeded_hash` of the seed string,
//! so the same configuration always yields the same table.

use crate::dataset::{Dataset, DatasetBuilder, OracleSpec};
use crate::error::Result;
use crate::splitter::seeded_hash;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Primary oracle channel name
pub const PAE: &str = "PAE";

/// Secondary oracle channel name
pub const MSA: &str = "MSA";

/// Synthetic dataset parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    pub n_items: usize,
    pub n_features: usize,
    /// Width of the uniform perturbation added to each oracle value
    pub label_noise: f64,
    pub seed: String,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_items: 500,
            n_features: 4,
            label_noise: 0.1,
            seed: "test-seed".to_string(),
        }
    }
}

/// Linear boundary `w·x + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearBoundary {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearBoundary {
    /// Signed margin of a point
    pub fn margin(&self, x: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(x)
            .map(|(w, v)| w * v)
            .sum::<f64>()
            + self.bias
    }
}

/// Boundary behind the PAE channel: decaying weights with alternating sign
pub fn pae_boundary(n_features: usize) -> LinearBoundary {
    LinearBoundary {
        weights: (0..n_features)
            .map(|j| {
                let magnitude = 1.0 / (j + 1) as f64;
                if j % 2 == 0 {
                    magnitude
                } else {
                    -magnitude
                }
            })
            .collect(),
        bias: 0.1,
    }
}

/// Boundary behind the MSA channel: the PAE pattern reversed
pub fn msa_boundary(n_features: usize) -> LinearBoundary {
    let mut weights = pae_boundary(n_features).weights;
    weights.reverse();
    LinearBoundary {
        weights,
        bias: -0.1,
    }
}

/// Feature column names `f0..f{n-1}`
pub fn feature_names(n_features: usize) -> Vec<String> {
    (0..n_features).map(|j| format!("f{}", j)).collect()
}

/// Oracle specs for the two synthetic channels
pub fn oracle_specs() -> Vec<OracleSpec> {
    vec![
        OracleSpec::new(PAE, "pae_value", 0.0),
        OracleSpec::new(MSA, "msa_value", 0.0),
    ]
}

/// Generate a dataset
///
/// # Example
/// ```
/// use oraclegate::synthetic::{generate, SyntheticConfig};
///
/// let dataset = generate(&SyntheticConfig::default()).unwrap();
/// assert_eq!(dataset.len(), 500);
/// assert_eq!(dataset.oracle_names(), vec!["PAE", "MSA"]);
/// ```
pub fn generate(config: &SyntheticConfig) -> Result<Dataset> {
    let mut rng = StdRng::seed_from_u64(seeded_hash(&config.seed, "synthetic", "rng"));
    let pae = pae_boundary(config.n_features);
    let msa = msa_boundary(config.n_features);
    let names = feature_names(config.n_features);
    let width = format!("{}", config.n_items.saturating_sub(1)).len().max(4);

    let mut builder = DatasetBuilder::new(names.clone(), oracle_specs());

    for i in 0..config.n_items {
        let x: Vec<f64> = (0..config.n_features)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let mut fields: BTreeMap<String, f64> = names.iter().cloned().zip(x.iter().copied()).collect();
        let pae_noise = config.label_noise * (rng.gen::<f64>() - 0.5);
        let msa_noise = config.label_noise * (rng.gen::<f64>() - 0.5);
        fields.insert("pae_value".to_string(), pae.margin(&x) + pae_noise);
        fields.insert("msa_value".to_string(), msa.margin(&x) + msa_noise);

        builder.add_record(format!("item-{:0width$}", i, width = width), &fields)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ItemId;

    #[test]
    fn test_generate_is_deterministic() {
        let config = SyntheticConfig::default();
        let a = generate(&config).unwrap();
        let b = generate(&config).unwrap();
        for id in a.ids() {
            assert_eq!(a.features(id).unwrap(), b.features(id).unwrap());
            assert_eq!(a.label(id, PAE).unwrap(), b.label(id, PAE).unwrap());
        }
    }

    #[test]
    fn test_ids_are_zero_padded() {
        let dataset = generate(&SyntheticConfig::default()).unwrap();
        let first = dataset.ids().next().unwrap();
        assert_eq!(first.as_str(), "item-0000");
        assert!(dataset.features(&ItemId::from("item-0499")).is_ok());
    }

    #[test]
    fn test_labels_follow_boundary_without_noise() {
        let config = SyntheticConfig {
            label_noise: 0.0,
            ..SyntheticConfig::default()
        };
        let dataset = generate(&config).unwrap();
        let boundary = pae_boundary(config.n_features);
        for id in dataset.ids() {
            let x = dataset.features(id).unwrap();
            let label = dataset.label(id, PAE).unwrap();
            assert_eq!(label.positive, boundary.margin(x) > 0.0);
        }
    }

    #[test]
    fn test_both_classes_present() {
        let dataset = generate(&SyntheticConfig::default()).unwrap();
        for oracle in [PAE, MSA] {
            let rate = dataset.positive_rate(oracle).unwrap();
            assert!(rate > 0.2 && rate < 0.8, "{} positive rate {}", oracle, rate);
        }
    }

    #[test]
    fn test_different_seed_changes_data() {
        let a = generate(&SyntheticConfig::default()).unwrap();
        let b = generate(&SyntheticConfig {
            seed: "other".to_string(),
            ..SyntheticConfig::default()
        })
        .unwrap();
        let id = ItemId::from("item-0000");
        assert_ne!(a.features(&id).unwrap(), b.features(&id).unwrap());
    }

    #[test]
    fn test_channel_boundaries_differ() {
        assert_ne!(pae_boundary(4), msa_boundary(4));
        assert_eq!(pae_boundary(3).weights, vec![1.0, -0.5, 1.0 / 3.0]);
    }
}
