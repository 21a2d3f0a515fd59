// Per-channel usability gate, joint gate, and independent audit

use super::config::GateConfig;
use crate::operating_point::OperatingPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const RATE_EPSILON: f64 = 1e-12;

/// Why a channel is or is not usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    Usable,
    /// Measured FPR exceeds cap + tolerance
    FprAboveCap,
    /// Alarm caught no positives
    NoTruePositives,
    /// TPR positive but under the configured minimum
    TprBelowMinimum,
}

/// Gate outcome for one channel at one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub oracle: String,
    pub fpr_cap: f64,
    pub point: OperatingPoint,
    pub usable: bool,
    pub reason: GateReason,
}

fn classify(tpr: f64, fpr: f64, config: &GateConfig) -> GateReason {
    if fpr > config.fpr_cap + config.tolerance + RATE_EPSILON {
        GateReason::FprAboveCap
    } else if tpr <= 0.0 {
        GateReason::NoTruePositives
    } else if tpr + RATE_EPSILON < config.min_tpr {
        GateReason::TprBelowMinimum
    } else {
        GateReason::Usable
    }
}

/// Apply the gate to an operating point measured at the cap
pub fn evaluate_gate(oracle: &str, point: OperatingPoint, config: &GateConfig) -> GateDecision {
    let reason = classify(point.tpr, point.fpr, config);
    GateDecision {
        oracle: oracle.to_string(),
        fpr_cap: config.fpr_cap,
        point,
        usable: reason == GateReason::Usable,
        reason,
    }
}

/// Logical AND over channels; an empty set is never usable
pub fn joint_gate(decisions: &[GateDecision]) -> bool {
    !decisions.is_empty() && decisions.iter().all(|d| d.usable)
}

/// Inconsistencies found when re-deriving a stored gate decision
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateAuditError {
    #[error("{oracle}: stored {field}={stored} but confusion counts give {recomputed}")]
    RateMismatch {
        oracle: String,
        field: &'static str,
        stored: f64,
        recomputed: f64,
    },

    #[error("{oracle}: stored usable={stored} but recomputed usable={recomputed}")]
    UsableMismatch {
        oracle: String,
        stored: bool,
        recomputed: bool,
    },

    #[error("{oracle}: decision recorded at cap {stored}, audit cap is {expected}")]
    CapMismatch {
        oracle: String,
        stored: f64,
        expected: f64,
    },

    #[error("{oracle}: reported usable with fpr={fpr} tpr={tpr}")]
    UsableOutOfBounds { oracle: String, fpr: f64, tpr: f64 },
}

/// Recompute rates from stored confusion counts and re-derive usability
///
/// A decision passes only if its stored TPR/FPR match the counts, its
/// usable flag matches the recomputed gate, and (when usable) the counts
/// themselves show FPR ≤ cap + tolerance and TPR > 0.
pub fn audit_gate(decision: &GateDecision, config: &GateConfig) -> Result<(), GateAuditError> {
    let oracle = decision.oracle.clone();

    if (decision.fpr_cap - config.fpr_cap).abs() > RATE_EPSILON {
        return Err(GateAuditError::CapMismatch {
            oracle,
            stored: decision.fpr_cap,
            expected: config.fpr_cap,
        });
    }

    let counts = decision.point.counts;
    let tpr = counts.tpr();
    let fpr = counts.fpr();

    for (field, stored, recomputed) in [
        ("tpr", decision.point.tpr, tpr),
        ("fpr", decision.point.fpr, fpr),
    ] {
        if (stored - recomputed).abs() > RATE_EPSILON {
            return Err(GateAuditError::RateMismatch {
                oracle,
                field,
                stored,
                recomputed,
            });
        }
    }

    let recomputed = classify(tpr, fpr, config) == GateReason::Usable;
    if recomputed != decision.usable {
        return Err(GateAuditError::UsableMismatch {
            oracle,
            stored: decision.usable,
            recomputed,
        });
    }

    if decision.usable && (fpr > config.fpr_cap + config.tolerance + RATE_EPSILON || counts.tp == 0)
    {
        return Err(GateAuditError::UsableOutOfBounds { oracle, fpr, tpr });
    }

    Ok(())
}
