//! Drift signals: the log of rejected candidates.
//!
//! Every IGNORE decision appends one signal against the behavior that won.
//! Signals are never updated. Counting them over a window is what lets
//! repeated weak pressure eventually override a strong belief.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::behavior::{BehaviorId, Polarity};
use crate::candidate::ValidCandidate;
use crate::credibility::Credibility;

/// Unique identifier for a drift signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(Uuid);

impl SignalId {
    /// Creates a new random signal ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a candidate relates to the behavior it was compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftType {
    /// Same target, opposite sentiment ("love Python" -> "hate Python").
    PolarityShift,
    /// Same intent and context, new target ("Python for backend" -> "Go for backend").
    TargetShift,
    /// Anything else ("prefer JS" -> "prefer TS for backend").
    Refinement,
}

impl fmt::Display for DriftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolarityShift => write!(f, "POLARITY_SHIFT"),
            Self::TargetShift => write!(f, "TARGET_SHIFT"),
            Self::Refinement => write!(f, "REFINEMENT"),
        }
    }
}

/// An immutable record of a candidate that lost against an existing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftSignal {
    pub id: SignalId,
    pub user_id: String,

    /// The behavior that was challenged.
    pub behavior_id: BehaviorId,

    pub intent: String,
    pub target: String,
    pub context: String,
    pub polarity: Polarity,
    pub credibility: Credibility,
    pub attempted_at: DateTime<Utc>,
    pub drift_type: DriftType,
}

impl DriftSignal {
    /// Records a rejected candidate against `behavior_id`.
    #[must_use]
    pub fn rejected(
        user_id: impl Into<String>,
        behavior_id: BehaviorId,
        candidate: &ValidCandidate,
        drift_type: DriftType,
    ) -> Self {
        Self {
            id: SignalId::new(),
            user_id: user_id.into(),
            behavior_id,
            intent: candidate.intent.clone(),
            target: candidate.target.clone(),
            context: candidate.context.clone(),
            polarity: candidate.polarity,
            credibility: candidate.credibility,
            attempted_at: candidate.observed_at,
            drift_type,
        }
    }
}
