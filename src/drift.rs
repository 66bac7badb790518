//! Drift classification and analysis.
//!
//! Both functions here are pure. `classify` labels how a candidate differs
//! from the behavior it matched; [`DriftAnalysis`] bundles decay and signal
//! accumulation into the inputs the resolution policy decides on.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::behavior::BehaviorRecord;
use crate::candidate::ValidCandidate;
use crate::credibility::Credibility;
use crate::decay::{effective_credibility, Decay};
use crate::signal::DriftType;

/// Classifies the relationship between an existing behavior and a candidate.
///
/// Rules, first match wins:
/// 1. Same target (case-insensitive) and opposite POSITIVE/NEGATIVE polarity: `PolarityShift`.
/// 2. Same intent and context, different target: `TargetShift`.
/// 3. Otherwise: `Refinement`.
#[must_use]
pub fn classify(existing: &BehaviorRecord, candidate: &ValidCandidate) -> DriftType {
    let same_target = existing.target_matches(&candidate.target);

    if same_target && existing.polarity.is_opposite(candidate.polarity) {
        return DriftType::PolarityShift;
    }

    if !same_target
        && existing.intent == candidate.intent
        && existing.context == candidate.context
    {
        return DriftType::TargetShift;
    }

    DriftType::Refinement
}

/// Decay and accumulation state of a matched behavior at decision time.
#[derive(Debug, Clone, Serialize)]
pub struct DriftAnalysis {
    pub decay: Decay,
    /// Drift signals against the behavior inside the counting window.
    pub signal_count: u64,
    /// `signal_count` reached the configured threshold.
    pub accumulation_detected: bool,
    /// Human-readable summary, carried into audit details.
    pub reason: String,
}

impl DriftAnalysis {
    /// Analyzes `existing` as of `now`.
    #[must_use]
    pub fn analyze(
        existing: &BehaviorRecord,
        now: DateTime<Utc>,
        signal_count: u64,
        params: AnalysisParams,
    ) -> Self {
        let decay = effective_credibility(
            existing.credibility,
            existing.last_seen_at,
            now,
            params.half_life_days,
        );
        let accumulation_detected = signal_count >= params.signal_threshold;

        let reason = if accumulation_detected {
            format!(
                "User persistence detected: {signal_count} attempts in last {} days reached threshold of {}",
                params.window_days, params.signal_threshold
            )
        } else if decay.elapsed_days > params.half_life_days {
            format!(
                "Behavior is stale: last seen {:.1} days ago, credibility decayed from {} to {}",
                decay.elapsed_days, existing.credibility, decay.effective
            )
        } else {
            "Behavior is still fresh and credible".to_string()
        };

        Self {
            decay,
            signal_count,
            accumulation_detected,
            reason,
        }
    }

    /// Effective (decayed) credibility of the matched behavior.
    #[must_use]
    pub fn effective(&self) -> Credibility {
        self.decay.effective
    }
}

/// Configuration slice needed by [`DriftAnalysis::analyze`].
#[derive(Debug, Clone, Copy)]
pub struct AnalysisParams {
    pub half_life_days: f64,
    pub signal_threshold: u64,
    pub window_days: f64,
}
