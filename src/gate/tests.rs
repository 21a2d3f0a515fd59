// Scenario tests for the monitorability and coherence gates
//
// Gate decisions must be reproducible from their confusion counts alone, and
// the coherence gate must never resolve a disagreement by picking a side.

use super::*;
use crate::operating_point::{ConfusionCounts, OperatingPoint, ScoredSet};

fn point(tp: usize, fn_: usize, fp: usize, tn: usize) -> OperatingPoint {
    let counts = ConfusionCounts { tp, fp, tn, fn_ };
    OperatingPoint {
        fpr_target: 0.05,
        threshold: 0.5,
        counts,
        tpr: counts.tpr(),
        fpr: counts.fpr(),
    }
}

/// Alarm catches most positives at 2% FPR
#[test]
fn test_usable_channel() {
    let decision = evaluate_gate("PAE", point(40, 10, 2, 98), &GateConfig::default());
    assert!(decision.usable);
    assert_eq!(decision.reason, GateReason::Usable);
    assert!(audit_gate(&decision, &GateConfig::default()).is_ok());
}

/// FPR at 10% breaks a 5% cap with 2% tolerance
#[test]
fn test_fpr_above_cap() {
    let decision = evaluate_gate("PAE", point(45, 5, 10, 90), &GateConfig::default());
    assert!(!decision.usable);
    assert_eq!(decision.reason, GateReason::FprAboveCap);
}

/// FPR within tolerance of the cap is still usable
#[test]
fn test_fpr_within_tolerance() {
    let decision = evaluate_gate("PAE", point(30, 20, 6, 94), &GateConfig::default());
    assert_eq!(decision.point.fpr, 0.06);
    assert!(decision.usable);
}

/// A silent alarm (threshold above every score) is never usable
#[test]
fn test_zero_tpr_never_usable() {
    let config = GateConfig {
        min_tpr: 0.0,
        ..GateConfig::default()
    };
    let decision = evaluate_gate("MSA", point(0, 50, 0, 100), &config);
    assert!(!decision.usable);
    assert_eq!(decision.reason, GateReason::NoTruePositives);
}

#[test]
fn test_tpr_below_minimum() {
    let decision = evaluate_gate("MSA", point(5, 45, 1, 99), &GateConfig::default());
    assert_eq!(decision.reason, GateReason::TprBelowMinimum);
}

#[test]
fn test_joint_gate_requires_all_channels() {
    let config = GateConfig::default();
    let good = evaluate_gate("PAE", point(40, 10, 2, 98), &config);
    let bad = evaluate_gate("MSA", point(0, 50, 0, 100), &config);

    assert!(joint_gate(&[good.clone()]));
    assert!(!joint_gate(&[good.clone(), bad]));
    assert!(!joint_gate(&[]));
}

/// Audit catches a tampered TPR
#[test]
fn test_audit_detects_rate_mismatch() {
    let config = GateConfig::default();
    let mut decision = evaluate_gate("PAE", point(40, 10, 2, 98), &config);
    decision.point.tpr = 0.95;
    assert!(matches!(
        audit_gate(&decision, &config),
        Err(GateAuditError::RateMismatch { field: "tpr", .. })
    ));
}

/// Audit catches a usable flag that the counts do not support
#[test]
fn test_audit_detects_usable_mismatch() {
    let config = GateConfig::default();
    let mut decision = evaluate_gate("PAE", point(45, 5, 20, 80), &config);
    assert!(!decision.usable);
    decision.usable = true;
    assert!(matches!(
        audit_gate(&decision, &config),
        Err(GateAuditError::UsableMismatch { .. })
    ));
}

#[test]
fn test_audit_detects_cap_mismatch() {
    let decision = evaluate_gate("PAE", point(40, 10, 2, 98), &GateConfig::default());
    assert!(matches!(
        audit_gate(&decision, &GateConfig::strict()),
        Err(GateAuditError::CapMismatch { .. })
    ));
}

/// Gate decision built from real scores survives a JSON round trip and audit
#[test]
fn test_audit_after_serialization() {
    let holdout = ScoredSet::new(
        vec![0.9, 0.8, 0.7, 0.2, 0.1, 0.05],
        vec![true, true, false, false, false, false],
    );
    let calibration = ScoredSet::new(vec![0.6, 0.3, 0.95], vec![false, false, true]);
    let op = OperatingPoint::evaluate(&calibration, &holdout, 0.05);
    let config = GateConfig::permissive();
    let decision = evaluate_gate("PAE", op, &GateConfig {
        fpr_cap: 0.05,
        ..config.clone()
    });

    let json = serde_json::to_string(&decision).unwrap();
    let restored: GateDecision = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, decision);
    assert!(audit_gate(
        &restored,
        &GateConfig {
            fpr_cap: 0.05,
            ..config
        }
    )
    .is_ok());
}

#[test]
fn test_coherence_both_silent() {
    assert_eq!(check_coherence(None, None, 2), CoherenceVerdict::NoEvent);
}

#[test]
fn test_coherence_agreement_within_window() {
    assert_eq!(
        check_coherence(Some(3), Some(2), 1),
        CoherenceVerdict::Coherent {
            primary: 3,
            alternate: 2
        }
    );
}

/// Primary fires, alternate silent: unstable, never silently primary
#[test]
fn test_coherence_primary_only_is_unstable() {
    assert_eq!(
        check_coherence(Some(2), None, 5),
        CoherenceVerdict::Unstable {
            primary: Some(2),
            alternate: None
        }
    );
}

#[test]
fn test_coherence_alternate_only_is_unstable() {
    assert!(check_coherence(None, Some(4), 5).is_unstable());
}

#[test]
fn test_coherence_outside_window_is_unstable() {
    let verdict = check_coherence(Some(1), Some(4), 2);
    assert!(verdict.is_unstable());
    assert!(!verdict.is_interpretable());
}

#[test]
fn test_coherence_zero_tolerance_requires_same_round() {
    assert!(check_coherence(Some(3), Some(3), 0).is_interpretable());
    assert!(check_coherence(Some(3), Some(4), 0).is_unstable());
}
