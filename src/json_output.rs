//! JSON run artifact
//!
//! `run.json` holds the configuration, per-round metrics, decision trace,
//! events and coherence verdicts of a run, plus a SHA-256 digest over the
//! canonical JSON of the round metrics and decision trace. Two runs with the
//! same configuration produce the same digest.

use crate::acquisition::{ChannelCoherence, ChannelSummary, RoundMetrics, RunOutcome};
use crate::config::RunConfig;
use crate::decision_trace::DecisionTrace;
use crate::events::TransitionEvent;
use crate::experiment::SweepOutcome;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Format tag written into every artifact
pub const FORMAT: &str = "oraclegate-run-v1";

/// Complete, self-describing record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub version: String,
    pub format: String,
    pub config: RunConfig,
    pub round_metrics: Vec<RoundMetrics>,
    pub decision_trace: Vec<DecisionTrace>,
    pub events: Vec<TransitionEvent>,
    pub coherence: Vec<ChannelCoherence>,
    pub final_state: Vec<ChannelSummary>,
    /// Seed sweep results, when one was run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepOutcome>,
    /// Hex SHA-256 of the canonical round metrics and decision trace
    pub digest: String,
}

/// Hex SHA-256 over `{"decision_trace": ..., "round_metrics": ...}`
pub fn compute_digest(
    round_metrics: &[RoundMetrics],
    decision_trace: &[DecisionTrace],
) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(&serde_json::json!({
        "round_metrics": round_metrics,
        "decision_trace": decision_trace,
    }))?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

impl RunArtifacts {
    /// Package a finished run
    pub fn from_outcome(outcome: RunOutcome) -> Result<Self, serde_json::Error> {
        let digest = compute_digest(&outcome.round_metrics, &outcome.decision_trace)?;
        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: FORMAT.to_string(),
            config: outcome.config,
            round_metrics: outcome.round_metrics,
            decision_trace: outcome.decision_trace,
            events: outcome.events,
            coherence: outcome.coherence,
            final_state: outcome.final_state,
            sweep: None,
            digest,
        })
    }

    /// Attach seed sweep results
    pub fn set_sweep(&mut self, sweep: SweepOutcome) {
        self.sweep = Some(sweep);
    }

    /// Whether the stored digest matches the stored metrics and trace
    pub fn verify_digest(&self) -> bool {
        compute_digest(&self.round_metrics, &self.decision_trace)
            .map(|d| d == self.digest)
            .unwrap_or(false)
    }

    /// Serialize to pretty JSON
    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a previously written artifact
    pub fn from_json(input: &str) -> anyhow::Result<Self> {
        let artifacts: Self = serde_json::from_str(input)?;
        if artifacts.format != FORMAT {
            anyhow::bail!("unsupported artifact format '{}'", artifacts.format);
        }
        Ok(artifacts)
    }

    /// Human-readable summary
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!(
            "oraclegate run (seed={}, rounds={}, budget={}/oracle)\n\n",
            self.config.seed,
            self.round_metrics.len().saturating_sub(1),
            self.config.budget_per_oracle
        ));

        report.push_str(&format!(
            "{:>5} {:<8} {:>7} {:>7} {:>7} {:>7} {:>7}\n",
            "round", "oracle", "labeled", "tpr", "fpr", "alt_tpr", "usable"
        ));
        for round in &self.round_metrics {
            for channel in &round.channels {
                report.push_str(&format!(
                    "{:>5} {:<8} {:>7} {:>7.3} {:>7.3} {:>7.3} {:>7}\n",
                    round.round,
                    channel.oracle,
                    channel.labeled_total,
                    channel.tpr_at_cap(),
                    channel.fpr_at_cap(),
                    channel.alternate_tpr_at_cap,
                    if channel.gate.usable { "yes" } else { "no" }
                ));
            }
            report.push_str(&format!(
                "{:>5} {:<8} joint gate: {}\n",
                "",
                "",
                if round.joint_usable { "usable" } else { "not usable" }
            ));
        }

        if self.events.is_empty() {
            report.push_str("\nEvents: none\n");
        } else {
            report.push_str("\nEvents:\n");
            for event in &self.events {
                report.push_str(&format!(
                    "  {} {:?} at round {} ({:?}, {:.3} -> {:.3})\n",
                    event.channel, event.source, event.round, event.kind, event.before, event.after
                ));
            }
        }

        report.push_str("\nCoherence:\n");
        for c in &self.coherence {
            report.push_str(&format!("  {}: {:?}\n", c.channel, c.verdict));
        }

        if let Some(sweep) = &self.sweep {
            report.push('\n');
            report.push_str(&sweep.assessment.to_report_string());
        }

        report.push_str(&format!("\ndigest: {}\n", self.digest));
        report
    }
}
