//! Acquisition Decision Tracing
//!
//! Every allocation, query, refit, gate evaluation, event and coherence
//! check of a run is recorded as a [`DecisionTrace`] entry. The trace is the
//! audit record of the run: it carries no wall-clock time, so two runs with
//! the same seed produce byte-identical traces.
//!
//! Each entry has a hash-based decision ID (FNV-1a over
//! `category::name::oracle::round`) that identifies the decision point
//! independently of its position in the trace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;

/// Decision categories written by the acquisition loop
pub mod category {
    pub const ALLOCATE: &str = "allocate";
    pub const QUERY: &str = "query";
    pub const REFIT: &str = "refit";
    pub const GATE: &str = "gate";
    pub const JOINT_GATE: &str = "joint_gate";
    pub const EVENT: &str = "event";
    pub const COHERENCE: &str = "coherence";
}

/// A single decision trace point
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionTrace {
    /// Position in the trace (0-based, strictly increasing)
    pub sequence: u64,

    /// Round the decision belongs to (0 = cold start)
    pub round: usize,

    /// Decision category (e.g., "allocate", "gate")
    pub category: String,

    /// Decision name (e.g., "uncertainty_mass", "tpr_at_cap")
    pub name: String,

    /// Oracle channel, or `None` for run-wide decisions
    pub oracle: Option<String>,

    /// Decision input (structured data)
    pub input: serde_json::Value,

    /// Decision result/output
    pub result: serde_json::Value,

    /// Hash-based decision ID (FNV-1a)
    pub decision_id: u64,
}

/// Generate decision ID using FNV-1a hash algorithm
///
/// Creates a 64-bit hash from `category::name::oracle::round`. Run-wide
/// decisions hash an empty oracle.
///
/// # Example
/// ```
/// use oraclegate::decision_trace::generate_decision_id;
///
/// let id = generate_decision_id("gate", "tpr_at_cap", "PAE", 3);
/// assert_ne!(id, 0);
///
/// // Deterministic - same inputs produce same hash
/// assert_eq!(id, generate_decision_id("gate", "tpr_at_cap", "PAE", 3));
/// assert_ne!(id, generate_decision_id("gate", "tpr_at_cap", "MSA", 3));
/// ```
pub fn generate_decision_id(category: &str, name: &str, oracle: &str, round: usize) -> u64 {
    let mut hasher = fnv::FnvHasher::default();

    // Hash format: "category::name::oracle::round"
    hasher.write(category.as_bytes());
    hasher.write(b"::");
    hasher.write(name.as_bytes());
    hasher.write(b"::");
    hasher.write(oracle.as_bytes());
    hasher.write(b"::");
    hasher.write(&(round as u64).to_le_bytes());

    hasher.finish()
}

/// Decision trace collector
#[derive(Debug, Default, Clone)]
pub struct DecisionTracer {
    traces: Vec<DecisionTrace>,
}

impl DecisionTracer {
    /// Create a new decision tracer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decision; returns its sequence number
    pub fn record(
        &mut self,
        round: usize,
        category: &str,
        name: &str,
        oracle: Option<&str>,
        input: serde_json::Value,
        result: serde_json::Value,
    ) -> u64 {
        let sequence = self.traces.len() as u64;
        let decision_id = generate_decision_id(category, name, oracle.unwrap_or(""), round);

        tracing::debug!(
            sequence,
            round,
            category,
            name,
            oracle = oracle.unwrap_or("-"),
            "decision recorded"
        );

        self.traces.push(DecisionTrace {
            sequence,
            round,
            category: category.to_string(),
            name: name.to_string(),
            oracle: oracle.map(str::to_string),
            input,
            result,
            decision_id,
        });

        sequence
    }

    /// Get all collected traces
    pub fn traces(&self) -> &[DecisionTrace] {
        &self.traces
    }

    /// Get trace count
    pub fn count(&self) -> usize {
        self.traces.len()
    }

    /// Entries grouped by category, each group in sequence order
    pub fn by_category(&self) -> BTreeMap<String, Vec<&DecisionTrace>> {
        let mut groups: BTreeMap<String, Vec<&DecisionTrace>> = BTreeMap::new();
        for trace in &self.traces {
            groups.entry(trace.category.clone()).or_default().push(trace);
        }
        groups
    }

    /// Entries belonging to one round
    pub fn for_round(&self, round: usize) -> Vec<&DecisionTrace> {
        self.traces.iter().filter(|t| t.round == round).collect()
    }

    /// Consume the tracer
    pub fn into_traces(self) -> Vec<DecisionTrace> {
        self.traces
    }

    /// One JSON object per line
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for trace in &self.traces {
            out.push_str(&serde_json::to_string(trace)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Rebuild a tracer from JSON lines, checking sequence and decision IDs
    ///
    /// Blank lines are ignored. A line whose `sequence` is out of order or
    /// whose `decision_id` does not match its key fields is rejected.
    pub fn from_json_lines(input: &str) -> Result<Self, String> {
        let mut tracer = Self::new();

        for (line_no, line) in input.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let trace: DecisionTrace = serde_json::from_str(line)
                .map_err(|e| format!("line {}: invalid trace JSON: {}", line_no + 1, e))?;

            let expected_sequence = tracer.traces.len() as u64;
            if trace.sequence != expected_sequence {
                return Err(format!(
                    "line {}: sequence {} out of order (expected {})",
                    line_no + 1,
                    trace.sequence,
                    expected_sequence
                ));
            }

            let expected_id = generate_decision_id(
                &trace.category,
                &trace.name,
                trace.oracle.as_deref().unwrap_or(""),
                trace.round,
            );
            if trace.decision_id != expected_id {
                return Err(format!(
                    "line {}: decision_id {} does not match {}::{}",
                    line_no + 1,
                    trace.decision_id,
                    trace.category,
                    trace.name
                ));
            }

            tracer.traces.push(trace);
        }

        Ok(tracer)
    }
}
