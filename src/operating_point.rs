//! Alarm thresholds at false-positive-rate targets
//!
//! Thresholds are calibrated on the validation labels acquired so far and
//! measured on the fixed holdout. An item raises an alarm when its score is
//! strictly greater than the threshold.

use serde::{Deserialize, Serialize};

/// Confusion counts for a thresholded alarm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionCounts {
    pub fn positives(&self) -> usize {
        self.tp + self.fn_
    }

    pub fn negatives(&self) -> usize {
        self.fp + self.tn
    }

    /// True-positive rate (0 when there are no positives)
    pub fn tpr(&self) -> f64 {
        if self.positives() == 0 {
            0.0
        } else {
            self.tp as f64 / self.positives() as f64
        }
    }

    /// False-positive rate (0 when there are no negatives)
    pub fn fpr(&self) -> f64 {
        if self.negatives() == 0 {
            0.0
        } else {
            self.fp as f64 / self.negatives() as f64
        }
    }
}

/// Highest threshold whose false-alarm count stays within `target`
///
/// With `n` negatives, `k = floor(target * n)` false alarms are allowed and
/// the threshold is the `(k+1)`-th highest negative score. Returns `-inf`
/// when every negative may alarm and `+inf` when there are no negatives
/// (no evidence, no alarms).
///
/// # Example
/// ```
/// use oraclegate::operating_point::threshold_at_fpr;
///
/// let negatives = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
/// assert_eq!(threshold_at_fpr(&negatives, 0.1), 0.9);
/// assert_eq!(threshold_at_fpr(&negatives, 0.0), 1.0);
/// ```
pub fn threshold_at_fpr(negative_scores: &[f64], target: f64) -> f64 {
    let n = negative_scores.len();
    if n == 0 {
        return f64::INFINITY;
    }

    let allowed = (target.clamp(0.0, 1.0) * n as f64 + 1e-9).floor() as usize;
    if allowed >= n {
        return f64::NEG_INFINITY;
    }

    let mut sorted = negative_scores.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted[allowed]
}

/// Count outcomes of `score > threshold` against labels
pub fn confusion_at(scores: &[f64], labels: &[bool], threshold: f64) -> ConfusionCounts {
    let mut counts = ConfusionCounts::default();
    for (&score, &positive) in scores.iter().zip(labels) {
        let alarm = score > threshold;
        match (alarm, positive) {
            (true, true) => counts.tp += 1,
            (true, false) => counts.fp += 1,
            (false, false) => counts.tn += 1,
            (false, true) => counts.fn_ += 1,
        }
    }
    counts
}

/// Scores and labels for one set of items
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredSet {
    pub scores: Vec<f64>,
    pub labels: Vec<bool>,
}

impl ScoredSet {
    pub fn new(scores: Vec<f64>, labels: Vec<bool>) -> Self {
        Self { scores, labels }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Scores of the negative items
    pub fn negative_scores(&self) -> Vec<f64> {
        self.scores
            .iter()
            .zip(&self.labels)
            .filter(|(_, &l)| !l)
            .map(|(&s, _)| s)
            .collect()
    }
}

/// Threshold and measured rates at one FPR target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub fpr_target: f64,
    #[serde(with = "threshold_repr")]
    pub threshold: f64,
    pub counts: ConfusionCounts,
    pub tpr: f64,
    pub fpr: f64,
}

impl OperatingPoint {
    /// Calibrate on `calibration`, measure on `holdout`
    pub fn evaluate(calibration: &ScoredSet, holdout: &ScoredSet, fpr_target: f64) -> Self {
        let threshold = threshold_at_fpr(&calibration.negative_scores(), fpr_target);
        Self::at_threshold(holdout, fpr_target, threshold)
    }

    /// Measure a fixed threshold on `holdout`
    pub fn at_threshold(holdout: &ScoredSet, fpr_target: f64, threshold: f64) -> Self {
        let counts = confusion_at(&holdout.scores, &holdout.labels, threshold);
        Self {
            fpr_target,
            threshold,
            counts,
            tpr: counts.tpr(),
            fpr: counts.fpr(),
        }
    }
}

// JSON has no infinities; unbounded thresholds are written as "inf" / "-inf"
mod threshold_repr {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Finite(f64),
        Unbounded(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            Repr::Finite(*value).serialize(serializer)
        } else if *value > 0.0 {
            Repr::Unbounded("inf".to_string()).serialize(serializer)
        } else {
            Repr::Unbounded("-inf".to_string()).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Finite(v) => Ok(v),
            Repr::Unbounded(s) if s == "inf" => Ok(f64::INFINITY),
            Repr::Unbounded(s) if s == "-inf" => Ok(f64::NEG_INFINITY),
            Repr::Unbounded(s) => Err(serde::de::Error::custom(format!(
                "invalid threshold '{}'",
                s
            ))),
        }
    }
}

/// Area under the ROC curve via the Mann–Whitney statistic
///
/// Ties count one half. `None` when either class is absent.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    let positives: Vec<f64> = scores
        .iter()
        .zip(labels)
        .filter(|(_, &l)| l)
        .map(|(&s, _)| s)
        .collect();
    let negatives: Vec<f64> = scores
        .iter()
        .zip(labels)
        .filter(|(_, &l)| !l)
        .map(|(&s, _)| s)
        .collect();

    if positives.is_empty() || negatives.is_empty() {
        return None;
    }

    let mut wins = 0.0;
    for p in &positives {
        for n in &negatives {
            if p > n {
                wins += 1.0;
            } else if p == n {
                wins += 0.5;
            }
        }
    }

    Some(wins / (positives.len() * negatives.len()) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_limits_false_alarms() {
        let negatives: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        for target in [0.0, 0.01, 0.05, 0.1, 0.5] {
            let t = threshold_at_fpr(&negatives, target);
            let alarms = negatives.iter().filter(|&&s| s > t).count();
            assert!(
                alarms as f64 <= target * 100.0 + 1e-9,
                "target {} produced {} alarms",
                target,
                alarms
            );
        }
    }

    #[test]
    fn test_threshold_edge_cases() {
        assert_eq!(threshold_at_fpr(&[], 0.05), f64::INFINITY);
        assert_eq!(threshold_at_fpr(&[0.3, 0.7], 1.0), f64::NEG_INFINITY);
        assert_eq!(threshold_at_fpr(&[0.3, 0.7], 0.0), 0.7);
    }

    #[test]
    fn test_threshold_with_ties() {
        let t = threshold_at_fpr(&[0.5, 0.5, 0.5, 0.1], 0.25);
        let alarms = [0.5, 0.5, 0.5, 0.1].iter().filter(|&&s| s > t).count();
        assert_eq!(alarms, 0);
    }

    #[test]
    fn test_confusion_counts() {
        let scores = [0.9, 0.8, 0.3, 0.2];
        let labels = [true, false, true, false];
        let c = confusion_at(&scores, &labels, 0.5);
        assert_eq!(
            c,
            ConfusionCounts {
                tp: 1,
                fp: 1,
                tn: 1,
                fn_: 1
            }
        );
        assert_eq!(c.tpr(), 0.5);
        assert_eq!(c.fpr(), 0.5);
    }

    #[test]
    fn test_rates_without_class() {
        let c = ConfusionCounts::default();
        assert_eq!(c.tpr(), 0.0);
        assert_eq!(c.fpr(), 0.0);
    }

    #[test]
    fn test_operating_point_uses_calibration_threshold() {
        let calibration = ScoredSet::new(vec![0.1, 0.2, 0.9], vec![false, false, true]);
        let holdout = ScoredSet::new(vec![0.15, 0.25, 0.8], vec![false, false, true]);
        let op = OperatingPoint::evaluate(&calibration, &holdout, 0.0);
        assert_eq!(op.threshold, 0.2);
        assert_eq!(op.counts.fp, 1);
        assert_eq!(op.counts.tp, 1);
        assert_eq!(op.fpr, 0.5);
        assert_eq!(op.tpr, 1.0);
    }

    #[test]
    fn test_no_calibration_negatives_means_no_alarms() {
        let calibration = ScoredSet::new(vec![0.9], vec![true]);
        let holdout = ScoredSet::new(vec![0.1, 0.99], vec![false, true]);
        let op = OperatingPoint::evaluate(&calibration, &holdout, 0.05);
        assert_eq!(op.counts.tp + op.counts.fp, 0);
        assert_eq!(op.tpr, 0.0);
    }

    #[test]
    fn test_roc_auc() {
        assert_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &[true, true, false, false]), Some(1.0));
        assert_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &[true, true, false, false]), Some(0.0));
        assert_eq!(roc_auc(&[0.5, 0.5], &[true, false]), Some(0.5));
        assert_eq!(roc_auc(&[0.5, 0.6], &[true, true]), None);
    }

    #[test]
    fn test_unbounded_threshold_survives_json() {
        let holdout = ScoredSet::new(vec![0.4], vec![false]);
        let op = OperatingPoint::at_threshold(&holdout, 0.05, f64::INFINITY);
        let json = serde_json::to_string(&op).unwrap();
        assert!(json.contains("\"threshold\":\"inf\""));
        let back: OperatingPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_counts_serialize_fn_field() {
        let json = serde_json::to_string(&ConfusionCounts {
            tp: 1,
            fp: 2,
            tn: 3,
            fn_: 4,
        })
        .unwrap();
        assert!(json.contains("\"fn\":4"));
    }
}
