//! Multi-round dual-oracle acquisition loop
//!
//! Round 0 evaluates every channel cold (no labels). Each later round:
//!
//! 1. scores every channel's unlabeled pool with its current classifier,
//! 2. allocates the round's query capacity between channels,
//! 3. ranks candidates and queries the top share, charging the budget,
//! 4. refits each channel on its training-split labels,
//! 5. evaluates each channel on the holdout and applies the gate,
//! 6. applies the joint gate.
//!
//! The loop stops early once no channel can take another label. Afterwards
//! events are detected on the per-round series and the classifier and
//! regressor events of each channel are checked for coherence. Every step is
//! written to the decision trace.

use crate::config::RunConfig;
use crate::dataset::{Dataset, ItemId, OracleLabel};
use crate::decision_trace::{category, DecisionTrace, DecisionTracer};
use crate::error::{OracleGateError, Result};
use crate::events::{
    classify_event, detect_boolean_onset, detect_channel_event, EventSource, TransitionEvent,
};
use crate::gate::{
    audit_gate, check_coherence, evaluate_gate, joint_gate, CoherenceVerdict, GateDecision,
};
use crate::model::{ChannelModel, Standardizer};
use crate::operating_point::{roc_auc, OperatingPoint, ScoredSet};
use crate::policy::{
    allocate, rank_candidates, uncertainty, BudgetLedger, Candidate, ChannelDemand,
    RankingContext,
};
use crate::splitter::{DeterministicSplitter, Split};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Channel name used for joint-gate events
pub const JOINT_CHANNEL: &str = "joint";

/// One channel's state after a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRoundMetrics {
    pub oracle: String,
    pub queried_this_round: usize,
    pub labeled_total: usize,
    pub labeled_positive: usize,
    pub labeled_negative: usize,
    pub trained: bool,
    /// One point per evaluation target, ascending
    pub operating_points: Vec<OperatingPoint>,
    /// Gate applied at the FPR cap
    pub gate: GateDecision,
    pub auc: Option<f64>,
    /// Regressor-proxy TPR at the FPR cap
    pub alternate_tpr_at_cap: f64,
    pub regressor_rmse: Option<f64>,
}

impl ChannelRoundMetrics {
    pub fn tpr_at_cap(&self) -> f64 {
        self.gate.point.tpr
    }

    pub fn fpr_at_cap(&self) -> f64 {
        self.gate.point.fpr
    }
}

/// Metrics for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    pub round: usize,
    pub channels: Vec<ChannelRoundMetrics>,
    pub joint_usable: bool,
    /// Oracle → labels spent so far
    pub cumulative_queries: BTreeMap<String, usize>,
}

impl RoundMetrics {
    pub fn channel(&self, oracle: &str) -> Option<&ChannelRoundMetrics> {
        self.channels.iter().find(|c| c.oracle == oracle)
    }

    /// Lowest TPR at the cap across channels (0 with no channels)
    pub fn min_tpr_at_cap(&self) -> f64 {
        self.channels
            .iter()
            .map(ChannelRoundMetrics::tpr_at_cap)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    pub fn total_queried(&self) -> usize {
        self.channels.iter().map(|c| c.queried_this_round).sum()
    }
}

/// Coherence verdict for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCoherence {
    pub channel: String,
    pub verdict: CoherenceVerdict,
}

/// Where a channel ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub oracle: String,
    pub budget: usize,
    pub spent: usize,
    /// Items in the order they were queried
    pub queried: Vec<ItemId>,
}

/// Everything a finished run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub config: RunConfig,
    pub round_metrics: Vec<RoundMetrics>,
    pub decision_trace: Vec<DecisionTrace>,
    pub events: Vec<TransitionEvent>,
    pub coherence: Vec<ChannelCoherence>,
    pub final_state: Vec<ChannelSummary>,
}

impl RunOutcome {
    /// Classifier TPR at the cap, one value per evaluated round
    pub fn tpr_series(&self, oracle: &str) -> Vec<f64> {
        self.round_metrics
            .iter()
            .map(|m| m.channel(oracle).map_or(0.0, ChannelRoundMetrics::tpr_at_cap))
            .collect()
    }

    pub fn joint_series(&self) -> Vec<bool> {
        self.round_metrics.iter().map(|m| m.joint_usable).collect()
    }

    /// Mean over rounds ≥ 1 of the weakest channel's TPR at the cap
    ///
    /// Zero when no acquisition round ran.
    pub fn learning_curve_score(&self) -> f64 {
        let values: Vec<f64> = self
            .round_metrics
            .iter()
            .filter(|m| m.round >= 1)
            .map(RoundMetrics::min_tpr_at_cap)
            .collect();
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    pub fn summary(&self, oracle: &str) -> Option<&ChannelSummary> {
        self.final_state.iter().find(|s| s.oracle == oracle)
    }
}

#[derive(Debug)]
struct ChannelState {
    oracle: String,
    ledger: BudgetLedger,
    unlabeled: BTreeSet<ItemId>,
    labeled: BTreeMap<ItemId, OracleLabel>,
    queried: Vec<ItemId>,
    model: ChannelModel,
    /// Labels of the holdout items, in holdout order
    holdout: Vec<OracleLabel>,
}

impl ChannelState {
    fn positives(&self) -> usize {
        self.labeled.values().filter(|l| l.positive).count()
    }
}

/// A configured run over one dataset
#[derive(Debug)]
pub struct AcquisitionRun<'a> {
    dataset: &'a Dataset,
    config: RunConfig,
    splitter: DeterministicSplitter,
    split: Split,
    holdout_rows: Vec<Vec<f64>>,
    /// Fitted on the acquisition pool; novelty is measured in this space
    pool_scaler: Standardizer,
    channels: Vec<ChannelState>,
    tracer: DecisionTracer,
}

impl<'a> AcquisitionRun<'a> {
    /// Validate the configuration and split the dataset
    pub fn new(dataset: &'a Dataset, config: RunConfig) -> Result<Self> {
        config.validate()?;
        if dataset.is_empty() {
            return Err(OracleGateError::EmptyDataset);
        }

        let splitter = DeterministicSplitter::new(
            config.seed.clone(),
            config.holdout_fraction,
            config.validation_fraction,
        )?;
        let split = splitter.split(dataset);

        let holdout_rows = rows_for(dataset, &split.holdout)?;
        let pool_rows = rows_for(dataset, &split.pool)?;
        let pool_scaler = if pool_rows.is_empty() {
            Standardizer::identity(dataset.n_features())
        } else {
            Standardizer::fit(&pool_rows)?
        };

        let mut channels = Vec::with_capacity(dataset.oracles().len());
        for spec in dataset.oracles() {
            let holdout = split
                .holdout
                .iter()
                .map(|id| dataset.label(id, &spec.name))
                .collect::<Result<Vec<_>>>()?;
            channels.push(ChannelState {
                oracle: spec.name.clone(),
                ledger: BudgetLedger::new(spec.name.clone(), config.budget_per_oracle),
                unlabeled: split.pool.iter().cloned().collect(),
                labeled: BTreeMap::new(),
                queried: Vec::new(),
                model: ChannelModel::untrained(),
                holdout,
            });
        }

        tracing::info!(
            seed = %config.seed,
            items = dataset.len(),
            holdout = split.holdout.len(),
            pool = split.pool.len(),
            oracles = channels.len(),
            "acquisition run prepared"
        );

        Ok(Self {
            dataset,
            config,
            splitter,
            split,
            holdout_rows,
            pool_scaler,
            channels,
            tracer: DecisionTracer::new(),
        })
    }

    pub fn split(&self) -> &Split {
        &self.split
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every round and the post-run event and coherence checks
    pub fn run(mut self) -> Result<RunOutcome> {
        // `rounds` is unbounded; the budget usually ends the loop much earlier
        let mut round_metrics = Vec::new();

        let cold = vec![0; self.channels.len()];
        round_metrics.push(self.evaluate_round(0, &cold)?);

        for round in 1..=self.config.rounds {
            let pools = self.score_pools()?;
            let demands = self.demands(&pools, round_metrics.last());

            if demands.iter().all(|d| d.headroom() == 0) {
                tracing::info!(round, "every pool or budget exhausted; stopping");
                break;
            }

            let shares = allocate(self.config.allocation, self.config.batch_size, &demands);
            self.tracer.record(
                round,
                category::ALLOCATE,
                self.config.allocation.as_str(),
                None,
                json!({
                    "capacity_per_oracle": self.config.batch_size,
                    "demands": demands,
                }),
                json!(demands
                    .iter()
                    .zip(&shares)
                    .map(|(d, s)| (d.oracle.clone(), *s))
                    .collect::<BTreeMap<String, usize>>()),
            );

            let mut queried = Vec::with_capacity(shares.len());
            for (idx, (pool, &share)) in pools.iter().zip(&shares).enumerate() {
                queried.push(self.query_channel(idx, round, pool, share)?);
            }

            for idx in 0..self.channels.len() {
                self.refit_channel(idx, round)?;
            }

            round_metrics.push(self.evaluate_round(round, &queried)?);
        }

        let (events, coherence) = self.detect_events(&round_metrics);

        let final_state = self
            .channels
            .iter()
            .map(|c| ChannelSummary {
                oracle: c.oracle.clone(),
                budget: c.ledger.total,
                spent: c.ledger.spent(),
                queried: c.queried.clone(),
            })
            .collect();

        Ok(RunOutcome {
            config: self.config,
            round_metrics,
            decision_trace: self.tracer.into_traces(),
            events,
            coherence,
            final_state,
        })
    }

    /// Current candidates of every channel, in id order
    fn score_pools(&self) -> Result<Vec<Vec<Candidate>>> {
        self.channels
            .iter()
            .map(|state| {
                state
                    .unlabeled
                    .iter()
                    .map(|id| {
                        let row = self.dataset.features(id)?;
                        Ok(Candidate {
                            id: id.clone(),
                            probability: state.model.score(row)?,
                            features: self.pool_scaler.transform(row)?,
                        })
                    })
                    .collect()
            })
            .collect()
    }

    fn demands(&self, pools: &[Vec<Candidate>], previous: Option<&RoundMetrics>) -> Vec<ChannelDemand> {
        self.channels
            .iter()
            .zip(pools)
            .map(|(state, pool)| {
                let tpr = previous
                    .and_then(|m| m.channel(&state.oracle))
                    .map_or(0.0, ChannelRoundMetrics::tpr_at_cap);
                ChannelDemand {
                    oracle: state.oracle.clone(),
                    remaining_budget: state.ledger.remaining(),
                    unlabeled: state.unlabeled.len(),
                    uncertainty_mass: pool.iter().map(|c| uncertainty(c.probability)).sum(),
                    gate_gap: self.config.gate.min_tpr - tpr,
                }
            })
            .collect()
    }

    /// Rank, query, and charge one channel; returns the number queried
    fn query_channel(
        &mut self,
        idx: usize,
        round: usize,
        pool: &[Candidate],
        share: usize,
    ) -> Result<usize> {
        let dataset = self.dataset;

        let selected = {
            let state = &self.channels[idx];
            let labeled = state
                .labeled
                .keys()
                .map(|id| self.pool_scaler.transform(dataset.features(id)?))
                .collect::<Result<Vec<_>>>()?;
            let ctx = RankingContext {
                seed: &self.config.seed,
                oracle: &state.oracle,
                round,
                mode: self.config.ranking,
                weights: &self.config.composite_weights,
                labeled: &labeled,
            };
            rank_candidates(&ctx, pool)
                .into_iter()
                .take(share)
                .collect::<Vec<_>>()
        };

        let state = &mut self.channels[idx];
        state.ledger.charge(selected.len())?;

        for candidate in &selected {
            if state.labeled.contains_key(&candidate.id) {
                return Err(OracleGateError::AlreadyLabeled {
                    item: candidate.id.to_string(),
                    oracle: state.oracle.clone(),
                });
            }
            let label = dataset.label(&candidate.id, &state.oracle)?;
            state.unlabeled.remove(&candidate.id);
            state.labeled.insert(candidate.id.clone(), label);
            state.queried.push(candidate.id.clone());
        }

        let ids: Vec<&str> = selected.iter().map(|c| c.id.as_str()).collect();
        let scores: Vec<f64> = selected.iter().map(|c| c.score).collect();
        self.tracer.record(
            round,
            category::QUERY,
            self.config.ranking.as_str(),
            Some(state.oracle.as_str()),
            json!({
                "share": share,
                "candidates": pool.len(),
            }),
            json!({
                "selected": ids,
                "scores": scores,
                "spent": state.ledger.spent(),
                "remaining_budget": state.ledger.remaining(),
            }),
        );

        tracing::debug!(
            round,
            oracle = %state.oracle,
            queried = selected.len(),
            remaining = state.ledger.remaining(),
            "queried oracle"
        );

        Ok(selected.len())
    }

    /// Refit a channel on its training-split labels
    fn refit_channel(&mut self, idx: usize, round: usize) -> Result<()> {
        let state = &self.channels[idx];

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        let mut values = Vec::new();
        for (id, label) in &state.labeled {
            if self.splitter.is_validation(id) {
                continue;
            }
            rows.push(self.dataset.features(id)?.to_vec());
            labels.push(label.positive);
            values.push(label.value);
        }

        let model = ChannelModel::fit(&rows, &labels, &values, &self.config.model)?;
        let train_positive = labels.iter().filter(|&&l| l).count();

        self.tracer.record(
            round,
            category::REFIT,
            "channel_model",
            Some(state.oracle.as_str()),
            json!({
                "train": rows.len(),
                "validation": state.labeled.len() - rows.len(),
                "train_positive": train_positive,
                "train_negative": rows.len() - train_positive,
            }),
            json!({
                "trained": model.is_trained(),
                "regressor": model.regressor.is_some(),
                "fit_error": model.fit_error,
            }),
        );

        self.channels[idx].model = model;
        Ok(())
    }

    /// Evaluate and gate every channel, then the joint gate
    fn evaluate_round(&mut self, round: usize, queried: &[usize]) -> Result<RoundMetrics> {
        let mut channels = Vec::with_capacity(self.channels.len());

        for (idx, &n) in queried.iter().enumerate() {
            let metrics = self.evaluate_channel(idx, n)?;
            audit_gate(&metrics.gate, &self.config.gate)?;

            self.tracer.record(
                round,
                category::GATE,
                "tpr_at_cap",
                Some(metrics.oracle.as_str()),
                json!({
                    "fpr_cap": self.config.gate.fpr_cap,
                    "tolerance": self.config.gate.tolerance,
                    "min_tpr": self.config.gate.min_tpr,
                    "trained": metrics.trained,
                }),
                json!({
                    "point": metrics.gate.point,
                    "usable": metrics.gate.usable,
                    "reason": metrics.gate.reason,
                    "alternate_tpr_at_cap": metrics.alternate_tpr_at_cap,
                    "auc": metrics.auc,
                }),
            );

            channels.push(metrics);
        }

        let decisions: Vec<GateDecision> = channels.iter().map(|c| c.gate.clone()).collect();
        let joint_usable = joint_gate(&decisions);
        self.tracer.record(
            round,
            category::JOINT_GATE,
            "all_channels",
            None,
            json!(decisions
                .iter()
                .map(|d| (d.oracle.clone(), d.usable))
                .collect::<BTreeMap<String, bool>>()),
            json!({ "usable": joint_usable }),
        );

        let cumulative_queries = self
            .channels
            .iter()
            .map(|c| (c.oracle.clone(), c.ledger.spent()))
            .collect();

        tracing::info!(
            round,
            joint_usable,
            queried = queried.iter().sum::<usize>(),
            "round evaluated"
        );

        Ok(RoundMetrics {
            round,
            channels,
            joint_usable,
            cumulative_queries,
        })
    }

    fn evaluate_channel(&self, idx: usize, queried_this_round: usize) -> Result<ChannelRoundMetrics> {
        let state = &self.channels[idx];
        let model = &state.model;
        let cap = self.config.gate.fpr_cap;

        let holdout_labels: Vec<bool> = state.holdout.iter().map(|l| l.positive).collect();
        let mut holdout_scores = Vec::with_capacity(self.holdout_rows.len());
        let mut holdout_values = Vec::with_capacity(self.holdout_rows.len());
        for row in &self.holdout_rows {
            holdout_scores.push(model.score(row)?);
            holdout_values.push(model.regress(row)?);
        }

        let mut cal_scores = Vec::new();
        let mut cal_values = Vec::new();
        let mut cal_labels = Vec::new();
        for (id, label) in &state.labeled {
            if !self.splitter.is_validation(id) {
                continue;
            }
            let row = self.dataset.features(id)?;
            cal_scores.push(model.score(row)?);
            cal_values.push(model.regress(row)?);
            cal_labels.push(label.positive);
        }

        let calibration = ScoredSet::new(cal_scores, cal_labels.clone());
        let holdout = ScoredSet::new(holdout_scores, holdout_labels.clone());

        let operating_points = self
            .config
            .evaluation_targets()
            .into_iter()
            .map(|target| OperatingPoint::evaluate(&calibration, &holdout, target))
            .collect();
        let gate = evaluate_gate(
            &state.oracle,
            OperatingPoint::evaluate(&calibration, &holdout, cap),
            &self.config.gate,
        );

        let alternate = OperatingPoint::evaluate(
            &ScoredSet::new(cal_values, cal_labels),
            &ScoredSet::new(holdout_values.clone(), holdout_labels),
            cap,
        );

        let auc = if model.is_trained() {
            roc_auc(&holdout.scores, &holdout.labels)
        } else {
            None
        };

        let regressor_rmse = match &model.regressor {
            Some(_) if !state.holdout.is_empty() => {
                let sse: f64 = holdout_values
                    .iter()
                    .zip(&state.holdout)
                    .map(|(p, l)| (p - l.value) * (p - l.value))
                    .sum();
                Some((sse / state.holdout.len() as f64).sqrt())
            }
            _ => None,
        };

        let labeled_positive = state.positives();
        Ok(ChannelRoundMetrics {
            oracle: state.oracle.clone(),
            queried_this_round,
            labeled_total: state.labeled.len(),
            labeled_positive,
            labeled_negative: state.labeled.len() - labeled_positive,
            trained: model.is_trained(),
            operating_points,
            gate,
            auc,
            alternate_tpr_at_cap: alternate.tpr,
            regressor_rmse,
        })
    }

    /// Per-channel and joint events, then coherence per channel
    fn detect_events(
        &mut self,
        metrics: &[RoundMetrics],
    ) -> (Vec<TransitionEvent>, Vec<ChannelCoherence>) {
        let final_round = metrics.last().map_or(0, |m| m.round);
        let event_config = self.config.event.clone();
        let oracles: Vec<String> = self.channels.iter().map(|c| c.oracle.clone()).collect();

        let mut events = Vec::new();
        let mut coherence = Vec::new();

        for oracle in &oracles {
            let primary = channel_series(metrics, oracle, ChannelRoundMetrics::tpr_at_cap);
            let alternate = channel_series(metrics, oracle, |c| c.alternate_tpr_at_cap);
            let trained: Vec<bool> = metrics
                .iter()
                .map(|m| m.channel(oracle).is_some_and(|c| c.trained))
                .collect();

            let primary_event =
                detect_channel_event(oracle, EventSource::Primary, &primary, &trained, &event_config);
            let alternate_event = detect_channel_event(
                oracle,
                EventSource::Alternate,
                &alternate,
                &trained,
                &event_config,
            );

            for (source, series, event) in [
                ("primary", &primary, &primary_event),
                ("alternate", &alternate, &alternate_event),
            ] {
                self.tracer.record(
                    final_round,
                    category::EVENT,
                    source,
                    Some(oracle.as_str()),
                    json!({ "series": series }),
                    json!(event),
                );
            }

            let verdict = check_coherence(
                primary_event.as_ref().map(|e| e.round),
                alternate_event.as_ref().map(|e| e.round),
                self.config.coherence_tolerance,
            );
            if verdict.is_unstable() {
                tracing::warn!(oracle = %oracle, ?verdict, "classifier and regressor events disagree");
            }
            self.tracer.record(
                final_round,
                category::COHERENCE,
                "primary_vs_alternate",
                Some(oracle.as_str()),
                json!({ "tolerance_rounds": self.config.coherence_tolerance }),
                json!(verdict),
            );

            events.extend(primary_event);
            events.extend(alternate_event);
            coherence.push(ChannelCoherence {
                channel: oracle.clone(),
                verdict,
            });
        }

        let joint: Vec<bool> = metrics.iter().map(|m| m.joint_usable).collect();
        let all_trained: Vec<bool> = metrics
            .iter()
            .map(|m| !m.channels.is_empty() && m.channels.iter().all(|c| c.trained))
            .collect();
        let joint_event = detect_boolean_onset(&joint, event_config.sustain_rounds).map(|round| {
            tracing::info!(round, "joint gate onset detected");
            TransitionEvent {
                channel: JOINT_CHANNEL.to_string(),
                source: EventSource::Joint,
                round,
                kind: classify_event(round, &all_trained),
                before: 0.0,
                after: 1.0,
            }
        });
        self.tracer.record(
            final_round,
            category::EVENT,
            "joint",
            None,
            json!({ "series": joint }),
            json!(joint_event),
        );
        events.extend(joint_event);

        (events, coherence)
    }
}

/// One value per round for a channel; 0 where the channel is missing
fn channel_series(
    metrics: &[RoundMetrics],
    oracle: &str,
    value: impl Fn(&ChannelRoundMetrics) -> f64,
) -> Vec<f64> {
    metrics
        .iter()
        .map(|m| m.channel(oracle).map_or(0.0, &value))
        .collect()
}

fn rows_for(dataset: &Dataset, ids: &[ItemId]) -> Result<Vec<Vec<f64>>> {
    ids.iter()
        .map(|id| dataset.features(id).map(<[f64]>::to_vec))
        .collect()
}
