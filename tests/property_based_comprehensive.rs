//! Property-based tests for the core invariants
//!
//! Covers the pieces every run depends on:
//! 1. Seeded hashing and split membership
//! 2. Threshold selection at an FPR target
//! 3. Capacity allocation between channels
//! 4. Budget ledgers
//! 5. Candidate ranking

use oraclegate::dataset::ItemId;
use oraclegate::operating_point::{confusion_at, threshold_at_fpr};
use oraclegate::policy::{
    allocate, rank_candidates, select_batch, AllocationMode, BudgetLedger, Candidate,
    ChannelDemand, CompositeWeights, RankingContext, RankingMode,
};
use oraclegate::splitter::{unit_hash, DeterministicSplitter};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_unit_hash_in_unit_interval(
        seed in "[a-z0-9-]{0,16}",
        salt in "[a-z:]{0,12}",
        key in "[A-Za-z0-9_]{0,20}",
    ) {
        let u = unit_hash(&seed, &salt, &key);
        prop_assert!((0.0..1.0).contains(&u));
        prop_assert_eq!(u, unit_hash(&seed, &salt, &key));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_split_membership_is_order_free(
        ids in prop::collection::vec("[a-z]{1,6}[0-9]{1,4}", 1..40),
        fraction in 0.0f64..0.95,
    ) {
        // Membership depends only on (seed, id), never on the other items
        let splitter = DeterministicSplitter::new("prop-seed", fraction, 0.0).unwrap();
        let forward: Vec<bool> = ids.iter().map(|id| splitter.is_holdout(&ItemId::new(id.as_str()))).collect();
        let backward: Vec<bool> = ids.iter().rev().map(|id| splitter.is_holdout(&ItemId::new(id.as_str()))).collect();
        let reversed: Vec<bool> = backward.into_iter().rev().collect();
        prop_assert_eq!(forward, reversed);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_threshold_respects_fpr_target(
        negatives in prop::collection::vec(0.0f64..1.0, 1..200),
        target in 0.0f64..1.0,
    ) {
        let threshold = threshold_at_fpr(&negatives, target);
        let labels = vec![false; negatives.len()];
        let counts = confusion_at(&negatives, &labels, threshold);

        // Alarms on negatives never exceed floor(target * n)
        let allowed = (target * negatives.len() as f64 + 1e-9).floor() as usize;
        prop_assert!(counts.fp <= allowed);
        prop_assert_eq!(counts.fp + counts.tn, negatives.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_threshold_is_infinite_without_negatives(target in 0.0f64..1.0) {
        prop_assert_eq!(threshold_at_fpr(&[], target), f64::INFINITY);
    }
}

fn demand_strategy() -> impl Strategy<Value = ChannelDemand> {
    (0usize..60, 0usize..60, 0.0f64..50.0, -1.0f64..1.0).prop_map(
        |(remaining_budget, unlabeled, uncertainty_mass, gate_gap)| ChannelDemand {
            oracle: "X".to_string(),
            remaining_budget,
            unlabeled,
            uncertainty_mass,
            gate_gap,
        },
    )
}

fn mode_strategy() -> impl Strategy<Value = AllocationMode> {
    prop_oneof![
        Just(AllocationMode::FixedSplit),
        Just(AllocationMode::UncertaintyMass),
        Just(AllocationMode::GapDriven),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn prop_allocation_never_exceeds_capacity_or_headroom(
        mode in mode_strategy(),
        capacity in 0usize..30,
        demands in prop::collection::vec(demand_strategy(), 1..5),
    ) {
        let shares = allocate(mode, capacity, &demands);
        prop_assert_eq!(shares.len(), demands.len());

        let total: usize = shares.iter().sum();
        prop_assert!(total <= capacity * demands.len());
        for (share, demand) in shares.iter().zip(&demands) {
            prop_assert!(*share <= demand.headroom());
        }
    }

    #[test]
    fn prop_proportional_allocation_uses_available_capacity(
        mode in prop_oneof![Just(AllocationMode::UncertaintyMass), Just(AllocationMode::GapDriven)],
        capacity in 0usize..30,
        demands in prop::collection::vec(demand_strategy(), 1..5),
    ) {
        // Surplus redistribution leaves nothing on the table that some channel could take
        let shares = allocate(mode, capacity, &demands);
        let headroom: usize = demands.iter().map(ChannelDemand::headroom).sum();
        let total: usize = shares.iter().sum();
        prop_assert_eq!(total, (capacity * demands.len()).min(headroom));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_ledger_never_overspends(
        total in 0usize..100,
        charges in prop::collection::vec(0usize..30, 0..20),
    ) {
        let mut ledger = BudgetLedger::new("X", total);
        for n in charges {
            let before = ledger.spent();
            if ledger.charge(n).is_err() {
                prop_assert_eq!(ledger.spent(), before);
            }
            prop_assert!(ledger.spent() <= total);
            prop_assert_eq!(ledger.spent() + ledger.remaining(), total);
        }
    }
}

fn candidates_strategy() -> impl Strategy<Value = Vec<Candidate>> {
    prop::collection::vec((0.0f64..1.0, -3.0f64..3.0, -3.0f64..3.0), 0..30).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (probability, a, b))| Candidate {
                id: ItemId::new(format!("item-{:03}", i)),
                probability,
                features: vec![a, b],
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_ranking_is_a_sorted_permutation(
        candidates in candidates_strategy(),
        mode in prop_oneof![
            Just(RankingMode::Uncertainty),
            Just(RankingMode::Novelty),
            Just(RankingMode::Composite),
            Just(RankingMode::Random),
        ],
        round in 0usize..10,
    ) {
        let weights = CompositeWeights::default();
        let labeled = vec![vec![0.0, 0.0]];
        let ctx = RankingContext {
            seed: "prop-seed",
            oracle: "PAE",
            round,
            mode,
            weights: &weights,
            labeled: &labeled,
        };

        let ranked = rank_candidates(&ctx, &candidates);
        prop_assert_eq!(ranked.len(), candidates.len());
        prop_assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

        let mut ids: Vec<&ItemId> = ranked.iter().map(|r| &r.id).collect();
        ids.sort();
        ids.dedup();
        prop_assert_eq!(ids.len(), candidates.len());

        // Same inputs, same order
        prop_assert_eq!(rank_candidates(&ctx, &candidates), ranked);
    }

    #[test]
    fn prop_select_batch_takes_prefix(
        candidates in candidates_strategy(),
        n in 0usize..40,
    ) {
        let weights = CompositeWeights::default();
        let ctx = RankingContext {
            seed: "prop-seed",
            oracle: "MSA",
            round: 1,
            mode: RankingMode::Uncertainty,
            weights: &weights,
            labeled: &[],
        };

        let batch = select_batch(&ctx, &candidates, n);
        prop_assert_eq!(batch.len(), n.min(candidates.len()));

        let ranked = rank_candidates(&ctx, &candidates);
        let prefix: Vec<ItemId> = ranked.into_iter().take(batch.len()).map(|r| r.id).collect();
        prop_assert_eq!(batch, prefix);
    }
}
