//! Acquisition policy: budget ledger, per-round allocation, candidate ranking
//!
//! Allocation divides a round's query capacity between oracle channels.
//! Ranking orders one channel's unlabeled candidates. Both are pure functions
//! of their inputs plus the seed string, so a run can be replayed exactly.

use crate::config::ConfigError;
use crate::dataset::ItemId;
use crate::error::{OracleGateError, Result};
use crate::splitter::unit_hash;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How round capacity is split between oracles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Every oracle gets the same per-round batch
    FixedSplit,
    /// Capacity follows each pool's summed classifier uncertainty
    UncertaintyMass,
    /// Capacity follows each channel's distance from the TPR floor
    GapDriven,
}

impl AllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMode::FixedSplit => "fixed_split",
            AllocationMode::UncertaintyMass => "uncertainty_mass",
            AllocationMode::GapDriven => "gap_driven",
        }
    }
}

/// How candidates are ordered within a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMode {
    Uncertainty,
    Novelty,
    Composite,
    /// Seeded hash order; the baseline every policy is compared against
    Random,
}

impl RankingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingMode::Uncertainty => "uncertainty",
            RankingMode::Novelty => "novelty",
            RankingMode::Composite => "composite",
            RankingMode::Random => "random",
        }
    }
}

/// Weights for composite ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub uncertainty: f64,
    pub novelty: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            uncertainty: 0.7,
            novelty: 0.3,
        }
    }
}

impl CompositeWeights {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if !valid(self.uncertainty) || !valid(self.novelty) {
            return Err(ConfigError::Invalid(format!(
                "composite weights must be finite and non-negative, got uncertainty={} novelty={}",
                self.uncertainty, self.novelty
            )));
        }
        if self.uncertainty + self.novelty <= 0.0 {
            return Err(ConfigError::Invalid(
                "composite weights must not both be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-oracle label budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLedger {
    pub oracle: String,
    pub total: usize,
    spent: usize,
}

impl BudgetLedger {
    pub fn new(oracle: impl Into<String>, total: usize) -> Self {
        Self {
            oracle: oracle.into(),
            total,
            spent: 0,
        }
    }

    pub fn spent(&self) -> usize {
        self.spent
    }

    pub fn remaining(&self) -> usize {
        self.total - self.spent
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Record `n` queries; never lets spending pass the total
    pub fn charge(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(OracleGateError::BudgetExceeded {
                oracle: self.oracle.clone(),
                requested: n,
                remaining: self.remaining(),
            });
        }
        self.spent += n;
        Ok(())
    }
}

/// What a channel reports to the allocator at the start of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDemand {
    pub oracle: String,
    pub remaining_budget: usize,
    pub unlabeled: usize,
    /// Sum of classifier uncertainty over the channel's unlabeled pool
    pub uncertainty_mass: f64,
    /// `min_tpr - tpr_at_cap` from the previous round
    pub gate_gap: f64,
}

impl ChannelDemand {
    /// Most labels this channel can take this round
    pub fn headroom(&self) -> usize {
        self.remaining_budget.min(self.unlabeled)
    }
}

/// Floor added to gaps so a satisfied channel still gets a sliver
const GAP_FLOOR: f64 = 1e-3;

/// Split the round's capacity between channels
///
/// `FixedSplit` gives each channel `capacity_per_oracle` capped by its
/// headroom. The proportional modes share `capacity_per_oracle * n` by
/// weight with largest-remainder rounding, cap each share by headroom, and
/// hand any surplus to channels with headroom left, in channel order.
///
/// # Example
/// ```
/// use oraclegate::policy::{allocate, AllocationMode, ChannelDemand};
///
/// let demand = |mass: f64| ChannelDemand {
///     oracle: "X".to_string(),
///     remaining_budget: 50,
///     unlabeled: 100,
///     uncertainty_mass: mass,
///     gate_gap: 0.0,
/// };
/// let shares = allocate(AllocationMode::UncertaintyMass, 10, &[demand(3.0), demand(1.0)]);
/// assert_eq!(shares, vec![15, 5]);
/// ```
pub fn allocate(
    mode: AllocationMode,
    capacity_per_oracle: usize,
    demands: &[ChannelDemand],
) -> Vec<usize> {
    if mode == AllocationMode::FixedSplit {
        return demands
            .iter()
            .map(|d| capacity_per_oracle.min(d.headroom()))
            .collect();
    }

    let weights: Vec<f64> = demands
        .iter()
        .map(|d| {
            if d.headroom() == 0 {
                return 0.0;
            }
            let w = match mode {
                AllocationMode::UncertaintyMass => d.uncertainty_mass,
                AllocationMode::GapDriven => d.gate_gap.max(0.0) + GAP_FLOOR,
                AllocationMode::FixedSplit => 1.0,
            };
            if w.is_finite() {
                w.max(0.0)
            } else {
                0.0
            }
        })
        .collect();

    let total = capacity_per_oracle * demands.len();
    let mut shares = proportional_shares(total, &weights, demands);

    let mut surplus = 0usize;
    for (share, demand) in shares.iter_mut().zip(demands) {
        if *share > demand.headroom() {
            surplus += *share - demand.headroom();
            *share = demand.headroom();
        }
    }

    if surplus > 0 {
        tracing::debug!(mode = mode.as_str(), surplus, "redistributing capped shares");
    }
    for (share, demand) in shares.iter_mut().zip(demands) {
        if surplus == 0 {
            break;
        }
        let extra = (demand.headroom() - *share).min(surplus);
        *share += extra;
        surplus -= extra;
    }

    shares
}

/// Largest-remainder apportionment, ties to the lower channel index
fn proportional_shares(total: usize, weights: &[f64], demands: &[ChannelDemand]) -> Vec<usize> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }

    let sum: f64 = weights.iter().sum();
    let weights: Vec<f64> = if sum > 0.0 {
        weights.to_vec()
    } else {
        // No signal: split evenly among channels that can still take labels
        demands
            .iter()
            .map(|d| if d.headroom() > 0 { 1.0 } else { 0.0 })
            .collect()
    };
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return vec![0; n];
    }

    let quotas: Vec<f64> = weights.iter().map(|w| total as f64 * w / sum).collect();
    let mut shares: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let assigned: usize = shares.iter().sum();
    let leftover = total.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..n).filter(|&i| weights[i] > 0.0).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas[a] - quotas[a].floor();
        let fb = quotas[b] - quotas[b].floor();
        fb.total_cmp(&fa).then(a.cmp(&b))
    });
    for &i in order.iter().take(leftover) {
        shares[i] += 1;
    }

    shares
}

/// Classifier uncertainty: 1 at p = 0.5, 0 at p ∈ {0, 1}
pub fn uncertainty(p: f64) -> f64 {
    (1.0 - (2.0 * p - 1.0).abs()).clamp(0.0, 1.0)
}

/// Minimum Euclidean distance from each candidate to any labeled point,
/// normalized by the largest such distance
///
/// Every candidate scores 1 when nothing is labeled yet.
pub fn novelty_scores(candidates: &[Vec<f64>], labeled: &[Vec<f64>]) -> Vec<f64> {
    if labeled.is_empty() {
        return vec![1.0; candidates.len()];
    }

    let distances: Vec<f64> = candidates
        .iter()
        .map(|c| {
            labeled
                .iter()
                .map(|l| {
                    c.iter()
                        .zip(l)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(f64::INFINITY, f64::min)
        })
        .collect();

    let max = distances.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return vec![0.0; candidates.len()];
    }
    distances.iter().map(|d| d / max).collect()
}

/// An unlabeled item as seen by the ranker
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: ItemId,
    /// Current classifier probability
    pub probability: f64,
    /// Standardized feature vector
    pub features: Vec<f64>,
}

/// Inputs shared by every candidate of one channel in one round
#[derive(Debug, Clone)]
pub struct RankingContext<'a> {
    pub seed: &'a str,
    pub oracle: &'a str,
    pub round: usize,
    pub mode: RankingMode,
    pub weights: &'a CompositeWeights,
    /// Standardized features of items this oracle already labeled
    pub labeled: &'a [Vec<f64>],
}

/// Candidate with its ranking score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub id: ItemId,
    pub score: f64,
}

/// Score and order candidates, best first
///
/// Ties break on `unit_hash(seed, "tie:{oracle}:{round}", id)` and then on id.
pub fn rank_candidates(ctx: &RankingContext<'_>, candidates: &[Candidate]) -> Vec<RankedCandidate> {
    let scores: Vec<f64> = match ctx.mode {
        RankingMode::Uncertainty => candidates.iter().map(|c| uncertainty(c.probability)).collect(),
        RankingMode::Novelty => novelty_scores(&feature_rows(candidates), ctx.labeled),
        RankingMode::Composite => {
            let novelty = novelty_scores(&feature_rows(candidates), ctx.labeled);
            candidates
                .iter()
                .zip(novelty)
                .map(|(c, n)| {
                    ctx.weights.uncertainty * uncertainty(c.probability) + ctx.weights.novelty * n
                })
                .collect()
        }
        RankingMode::Random => {
            let salt = format!("rank:{}:{}", ctx.oracle, ctx.round);
            candidates
                .iter()
                .map(|c| unit_hash(ctx.seed, &salt, c.id.as_str()))
                .collect()
        }
    };

    let tie_salt = format!("tie:{}:{}", ctx.oracle, ctx.round);
    let mut ranked: Vec<(RankedCandidate, f64)> = candidates
        .iter()
        .zip(scores)
        .map(|(c, score)| {
            let tie = unit_hash(ctx.seed, &tie_salt, c.id.as_str());
            (
                RankedCandidate {
                    id: c.id.clone(),
                    score,
                },
                tie,
            )
        })
        .collect();

    ranked.sort_by(|(a, ta), (b, tb)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| ta.partial_cmp(tb).unwrap_or(Ordering::Equal))
            .then_with(|| a.id.cmp(&b.id))
    });

    ranked.into_iter().map(|(c, _)| c).collect()
}

/// Top `n` candidate ids
pub fn select_batch(ctx: &RankingContext<'_>, candidates: &[Candidate], n: usize) -> Vec<ItemId> {
    rank_candidates(ctx, candidates)
        .into_iter()
        .take(n)
        .map(|c| c.id)
        .collect()
}

fn feature_rows(candidates: &[Candidate]) -> Vec<Vec<f64>> {
    candidates.iter().map(|c| c.features.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demand(budget: usize, unlabeled: usize, mass: f64, gap: f64) -> ChannelDemand {
        ChannelDemand {
            oracle: "X".to_string(),
            remaining_budget: budget,
            unlabeled,
            uncertainty_mass: mass,
            gate_gap: gap,
        }
    }

    fn candidate(id: &str, p: f64, x: f64) -> Candidate {
        Candidate {
            id: ItemId::from(id),
            probability: p,
            features: vec![x],
        }
    }

    fn ctx<'a>(mode: RankingMode, weights: &'a CompositeWeights, labeled: &'a [Vec<f64>]) -> RankingContext<'a> {
        RankingContext {
            seed: "test-seed",
            oracle: "PAE",
            round: 1,
            mode,
            weights,
            labeled,
        }
    }

    #[test]
    fn test_ledger_never_overspends() {
        let mut ledger = BudgetLedger::new("PAE", 15);
        ledger.charge(10).unwrap();
        assert_eq!(ledger.remaining(), 5);
        assert!(ledger.charge(6).is_err());
        assert_eq!(ledger.spent(), 10);
        ledger.charge(5).unwrap();
        assert!(ledger.is_exhausted());
    }

    #[test]
    fn test_fixed_split_caps_by_headroom() {
        let shares = allocate(
            AllocationMode::FixedSplit,
            10,
            &[demand(50, 100, 0.0, 0.0), demand(4, 100, 0.0, 0.0), demand(50, 2, 0.0, 0.0)],
        );
        assert_eq!(shares, vec![10, 4, 2]);
    }

    #[test]
    fn test_uncertainty_mass_redistributes_surplus() {
        let shares = allocate(
            AllocationMode::UncertaintyMass,
            10,
            &[demand(5, 100, 9.0, 0.0), demand(50, 100, 1.0, 0.0)],
        );
        assert_eq!(shares, vec![5, 15]);
    }

    #[test]
    fn test_uncertainty_mass_conserves_capacity() {
        let shares = allocate(
            AllocationMode::UncertaintyMass,
            10,
            &[demand(50, 100, 1.0, 0.0), demand(50, 100, 1.0, 0.0), demand(50, 100, 1.0, 0.0)],
        );
        assert_eq!(shares.iter().sum::<usize>(), 30);
        assert_eq!(shares, vec![10, 10, 10]);
    }

    #[test]
    fn test_largest_remainder_ties_to_lower_index() {
        let shares = allocate(
            AllocationMode::UncertaintyMass,
            1,
            &[demand(50, 100, 1.0, 0.0), demand(50, 100, 1.0, 0.0), demand(50, 100, 1.0, 0.0)],
        );
        assert_eq!(shares, vec![1, 1, 1]);

        let shares = allocate(
            AllocationMode::UncertaintyMass,
            1,
            &[demand(50, 100, 1.0, 0.0), demand(50, 100, 1.0, 0.0)],
        );
        assert_eq!(shares, vec![1, 1]);
    }

    #[test]
    fn test_gap_driven_prefers_lagging_channel() {
        let shares = allocate(
            AllocationMode::GapDriven,
            10,
            &[demand(50, 100, 0.0, 0.5), demand(50, 100, 0.0, -0.3)],
        );
        assert_eq!(shares.iter().sum::<usize>(), 20);
        assert!(shares[0] > shares[1]);
    }

    #[test]
    fn test_zero_mass_splits_evenly() {
        let shares = allocate(
            AllocationMode::UncertaintyMass,
            10,
            &[demand(50, 100, 0.0, 0.0), demand(50, 100, 0.0, 0.0)],
        );
        assert_eq!(shares, vec![10, 10]);
    }

    #[test]
    fn test_exhausted_channels_get_nothing() {
        let shares = allocate(
            AllocationMode::UncertaintyMass,
            10,
            &[demand(0, 100, 5.0, 0.0), demand(50, 100, 1.0, 0.0)],
        );
        assert_eq!(shares, vec![0, 20]);
    }

    #[test]
    fn test_uncertainty_shape() {
        assert_eq!(uncertainty(0.5), 1.0);
        assert_eq!(uncertainty(0.0), 0.0);
        assert_eq!(uncertainty(1.0), 0.0);
        assert!((uncertainty(0.75) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_novelty_scores() {
        let candidates = vec![vec![0.0], vec![1.0], vec![3.0]];
        let labeled = vec![vec![0.0]];
        assert_eq!(novelty_scores(&candidates, &labeled), vec![0.0, 1.0 / 3.0, 1.0]);
        assert_eq!(novelty_scores(&candidates, &[]), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_rank_by_uncertainty() {
        let weights = CompositeWeights::default();
        let c = ctx(RankingMode::Uncertainty, &weights, &[]);
        let ranked = rank_candidates(
            &c,
            &[candidate("a", 0.9, 0.0), candidate("b", 0.5, 0.0), candidate("c", 0.3, 0.0)],
        );
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_by_novelty() {
        let weights = CompositeWeights::default();
        let labeled = vec![vec![0.0]];
        let c = ctx(RankingMode::Novelty, &weights, &labeled);
        let ids = select_batch(
            &c,
            &[candidate("near", 0.5, 0.1), candidate("far", 0.5, 5.0)],
            1,
        );
        assert_eq!(ids, vec![ItemId::from("far")]);
    }

    #[test]
    fn test_composite_blends_scores() {
        let weights = CompositeWeights {
            uncertainty: 0.0,
            novelty: 1.0,
        };
        let labeled = vec![vec![0.0]];
        let c = ctx(RankingMode::Composite, &weights, &labeled);
        let ids = select_batch(
            &c,
            &[candidate("uncertain", 0.5, 0.0), candidate("novel", 0.99, 4.0)],
            1,
        );
        assert_eq!(ids, vec![ItemId::from("novel")]);
    }

    #[test]
    fn test_ties_broken_deterministically() {
        let weights = CompositeWeights::default();
        let c = ctx(RankingMode::Uncertainty, &weights, &[]);
        let candidates: Vec<Candidate> = (0..20)
            .map(|i| candidate(&format!("i{}", i), 0.5, 0.0))
            .collect();
        let first = rank_candidates(&c, &candidates);
        let mut reversed = candidates.clone();
        reversed.reverse();
        let second = rank_candidates(&c, &reversed);
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_ranking_depends_on_round() {
        let weights = CompositeWeights::default();
        let candidates: Vec<Candidate> = (0..50)
            .map(|i| candidate(&format!("i{}", i), 0.5, 0.0))
            .collect();
        let mut c = ctx(RankingMode::Random, &weights, &[]);
        let round1 = select_batch(&c, &candidates, 10);
        c.round = 2;
        let round2 = select_batch(&c, &candidates, 10);
        assert_ne!(round1, round2);
        c.round = 1;
        assert_eq!(select_batch(&c, &candidates, 10), round1);
    }

    #[test]
    fn test_composite_weights_validation() {
        assert!(CompositeWeights::default().validate().is_ok());
        assert!(CompositeWeights {
            uncertainty: 0.0,
            novelty: 0.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_composite_weights_reject_non_finite() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.1] {
            let weights = CompositeWeights {
                uncertainty: bad,
                novelty: 0.3,
            };
            assert!(weights.validate().is_err(), "accepted uncertainty={}", bad);

            let weights = CompositeWeights {
                uncertainty: 0.7,
                novelty: bad,
            };
            assert!(weights.validate().is_err(), "accepted novelty={}", bad);
        }
    }
}
