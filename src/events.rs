//! Event detection over round-by-round gate series
//!
//! An event is a sustained jump: the series rises by at least `min_jump`
//! over the previous round and stays at or above that level for
//! `sustain_rounds` rounds. Events are labeled availability-driven when the
//! channel had no trainable model the round before (the label budget just
//! became sufficient), learning-driven otherwise.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

const JUMP_EPSILON: f64 = 1e-12;

/// Sustained-jump detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Minimum rise over the previous round
    pub min_jump: f64,
    /// Rounds (including the jump round) the raised level must hold
    pub sustain_rounds: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            min_jump: 0.2,
            sustain_rounds: 2,
        }
    }
}

impl EventConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_jump > 0.0 && self.min_jump <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "event.min_jump must be in (0, 1], got {}",
                self.min_jump
            )));
        }
        if self.sustain_rounds == 0 {
            return Err(ConfigError::Invalid(
                "event.sustain_rounds must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which estimator produced a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Classifier TPR at the cap
    Primary,
    /// Regressor-proxy TPR at the cap
    Alternate,
    /// Joint gate (all channels usable)
    Joint,
}

/// Cause of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The channel only became trainable at the jump
    AvailabilityDriven,
    /// The channel was already trained; the model improved
    LearningDriven,
}

/// A detected transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub channel: String,
    pub source: EventSource,
    pub round: usize,
    pub kind: EventKind,
    /// Series value the round before the jump
    pub before: f64,
    /// Series value at the jump
    pub after: f64,
}

/// First round with a sustained jump, if any
///
/// # Example
/// ```
/// use oraclegate::events::{detect_sustained_jump, EventConfig};
///
/// let config = EventConfig { min_jump: 0.2, sustain_rounds: 2 };
/// assert_eq!(detect_sustained_jump(&[0.0, 0.1, 0.5, 0.6, 0.6], &config), Some(2));
/// // a spike that collapses is not sustained
/// assert_eq!(detect_sustained_jump(&[0.0, 0.5, 0.0, 0.0], &config), None);
/// ```
pub fn detect_sustained_jump(series: &[f64], config: &EventConfig) -> Option<usize> {
    let sustain = config.sustain_rounds.max(1);

    (1..series.len()).find(|&r| {
        let level = series[r - 1] + config.min_jump - JUMP_EPSILON;
        r + sustain <= series.len() && series[r..r + sustain].iter().all(|&v| v >= level)
    })
}

/// First round where a boolean series turns true and stays true
pub fn detect_boolean_onset(series: &[bool], sustain_rounds: usize) -> Option<usize> {
    let sustain = sustain_rounds.max(1);

    (1..series.len()).find(|&r| {
        !series[r - 1] && r + sustain <= series.len() && series[r..r + sustain].iter().all(|&v| v)
    })
}

/// Classify an event at `round` given per-round trainability
pub fn classify_event(round: usize, trained: &[bool]) -> EventKind {
    match round.checked_sub(1).and_then(|prev| trained.get(prev)) {
        Some(false) => EventKind::AvailabilityDriven,
        _ => EventKind::LearningDriven,
    }
}

/// Detect and classify a channel's event in one step
pub fn detect_channel_event(
    channel: &str,
    source: EventSource,
    series: &[f64],
    trained: &[bool],
    config: &EventConfig,
) -> Option<TransitionEvent> {
    let round = detect_sustained_jump(series, config)?;
    let event = TransitionEvent {
        channel: channel.to_string(),
        source,
        round,
        kind: classify_event(round, trained),
        before: series[round - 1],
        after: series[round],
    };
    tracing::info!(
        channel,
        round,
        kind = ?event.kind,
        source = ?source,
        "sustained jump detected"
    );
    Some(event)
}
