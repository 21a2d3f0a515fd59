//! Deterministic hash-based splitting
//!
//! Every random-looking choice in a run (holdout membership, train vs
//! validation, random ranking, tie-breaks) is derived from an FNV-1a hash of
//! `seed::salt::key`, passed through a splitmix64 finalizer so that keys
//! differing only in their last bytes still spread over the whole output
//! range. There is no RNG state to thread through the loop, so a
//! given seed string reproduces the same assignment regardless of the order
//! in which items were inserted.

use crate::config::ConfigError;
use crate::dataset::{Dataset, ItemId};
use std::collections::BTreeSet;
use std::hash::Hasher;

/// Hash `seed::salt::key` with FNV-1a (64-bit), then mix the result
pub fn seeded_hash(seed: &str, salt: &str, key: &str) -> u64 {
    let mut hasher = fnv::FnvHasher::default();

    hasher.write(seed.as_bytes());
    hasher.write(b"::");
    hasher.write(salt.as_bytes());
    hasher.write(b"::");
    hasher.write(key.as_bytes());

    mix64(hasher.finish())
}

/// splitmix64 finalizer
///
/// FNV-1a only propagates a trailing byte into the low bits, so sequential
/// ids would otherwise share their high bits.
fn mix64(mut z: u64) -> u64 {
    z ^= z >> 30;
    z = z.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z ^= z >> 27;
    z = z.wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Map `seed::salt::key` to a uniform value in `[0, 1)`
///
/// # Example
/// ```
/// use oraclegate::splitter::unit_hash;
///
/// let a = unit_hash("test-seed", "holdout", "item-0001");
/// assert!((0.0..1.0).contains(&a));
/// assert_eq!(a, unit_hash("test-seed", "holdout", "item-0001"));
/// ```
pub fn unit_hash(seed: &str, salt: &str, key: &str) -> f64 {
    // Top 53 bits fill an f64 mantissa exactly
    (seeded_hash(seed, salt, key) >> 11) as f64 / (1u64 << 53) as f64
}

/// Holdout / acquisition-pool partition of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Items used only for evaluation
    pub holdout: Vec<ItemId>,
    /// Items available for querying
    pub pool: Vec<ItemId>,
}

/// Seed-keyed splitter for holdout and validation membership
#[derive(Debug, Clone)]
pub struct DeterministicSplitter {
    seed: String,
    holdout_fraction: f64,
    validation_fraction: f64,
}

impl DeterministicSplitter {
    /// Create a splitter; fractions must lie in `[0, 1)`
    pub fn new(
        seed: impl Into<String>,
        holdout_fraction: f64,
        validation_fraction: f64,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("holdout_fraction", holdout_fraction),
            ("validation_fraction", validation_fraction),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in [0, 1), got {}",
                    name, value
                )));
            }
        }

        Ok(Self {
            seed: seed.into(),
            holdout_fraction,
            validation_fraction,
        })
    }

    /// Seed string this splitter is keyed by
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Whether an item belongs to the holdout set
    pub fn is_holdout(&self, id: &ItemId) -> bool {
        unit_hash(&self.seed, "holdout", id.as_str()) < self.holdout_fraction
    }

    /// Whether a labeled pool item is reserved for threshold calibration
    pub fn is_validation(&self, id: &ItemId) -> bool {
        unit_hash(&self.seed, "validation", id.as_str()) < self.validation_fraction
    }

    /// Partition the dataset into holdout and pool, both in id order
    pub fn split(&self, dataset: &Dataset) -> Split {
        let (holdout, pool): (Vec<ItemId>, Vec<ItemId>) = dataset
            .ids()
            .cloned()
            .partition(|id| self.is_holdout(id));

        tracing::debug!(
            seed = %self.seed,
            holdout = holdout.len(),
            pool = pool.len(),
            "split dataset"
        );

        Split { holdout, pool }
    }

    /// Ids among `labeled` that go to training (the rest calibrate)
    pub fn training_subset<'a>(
        &self,
        labeled: impl IntoIterator<Item = &'a ItemId>,
    ) -> BTreeSet<ItemId> {
        labeled
            .into_iter()
            .filter(|id| !self.is_validation(id))
            .cloned()
            .collect()
    }
}
