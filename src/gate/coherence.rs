// Coherence gate: two estimators of the same event must agree in time

use serde::{Deserialize, Serialize};

/// Outcome of comparing primary and alternate event rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum CoherenceVerdict {
    /// Neither estimator signaled an event
    NoEvent,
    /// Both signaled within the tolerance window
    Coherent { primary: usize, alternate: usize },
    /// One signaled and the other did not (or not within the window)
    Unstable {
        primary: Option<usize>,
        alternate: Option<usize>,
    },
}

impl CoherenceVerdict {
    /// Whether downstream interpretation of the event is allowed
    pub fn is_interpretable(&self) -> bool {
        matches!(self, CoherenceVerdict::Coherent { .. })
    }

    pub fn is_unstable(&self) -> bool {
        matches!(self, CoherenceVerdict::Unstable { .. })
    }
}

/// Compare event rounds from two estimators
///
/// # Example
/// ```
/// use oraclegate::gate::{check_coherence, CoherenceVerdict};
///
/// assert_eq!(check_coherence(None, None, 1), CoherenceVerdict::NoEvent);
/// assert!(check_coherence(Some(3), Some(4), 1).is_interpretable());
/// assert!(check_coherence(Some(3), None, 1).is_unstable());
/// ```
pub fn check_coherence(
    primary: Option<usize>,
    alternate: Option<usize>,
    tolerance_rounds: usize,
) -> CoherenceVerdict {
    match (primary, alternate) {
        (None, None) => CoherenceVerdict::NoEvent,
        (Some(p), Some(a)) if p.abs_diff(a) <= tolerance_rounds => CoherenceVerdict::Coherent {
            primary: p,
            alternate: a,
        },
        (primary, alternate) => CoherenceVerdict::Unstable { primary, alternate },
    }
}
