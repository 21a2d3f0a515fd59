// Monitorability and coherence gates
//
// A channel is "usable" when its alarm, thresholded at a capped false-positive
// rate, still catches a minimum share of true positives on the holdout. The
// joint gate requires every channel usable at once. Stored gate decisions can
// be re-audited from their confusion counts alone.
//
// The coherence gate compares event rounds reported by two independent
// estimators of the same boundary (classifier vs regressor proxy) and reports
// disagreement as unstable instead of preferring either one.

mod coherence;
mod config;
mod monitorability;

pub use coherence::{check_coherence, CoherenceVerdict};
pub use config::GateConfig;
pub use monitorability::{
    audit_gate, evaluate_gate, joint_gate, GateAuditError, GateDecision, GateReason,
};

#[cfg(test)]
mod tests;
