//! Resolution actions, the audit output of the engine.
//!
//! Each candidate produces exactly one [`ResolutionAction`]. The action kind
//! is an enum carrying only the data that kind can have, so an INSERT can
//! never claim an old behavior ID and an IGNORE can never be "forced".
//! The flat wire shape is produced on serialization.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorId;
use crate::credibility::Credibility;
use crate::signal::{DriftType, SignalId};

/// Action type as it appears in audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Insert,
    Reinforce,
    Supersede,
    Ignore,
    Error,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Reinforce => write!(f, "REINFORCE"),
            Self::Supersede => write!(f, "SUPERSEDE"),
            Self::Ignore => write!(f, "IGNORE"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// What happened to the ledger for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No match within the semantic gate; a new record was created.
    Insert {
        new_id: BehaviorId,
    },
    /// The matched record was reinforced in place.
    Reinforce {
        behavior_id: BehaviorId,
        reinforcement_count: u32,
    },
    /// The matched record was replaced by a new one.
    Supersede {
        old_id: BehaviorId,
        new_id: BehaviorId,
        forced_by_drift: bool,
        drift_type: DriftType,
    },
    /// The candidate lost; a drift signal was logged against the match.
    Ignore {
        behavior_id: BehaviorId,
        signal_id: SignalId,
        drift_type: DriftType,
    },
    /// The candidate could not be resolved.
    Error {
        kind: &'static str,
        behavior_id: Option<BehaviorId>,
    },
}

/// One audit entry.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "ActionRecord")]
pub struct ResolutionAction {
    pub outcome: Outcome,
    pub reason: String,
    pub details: String,
    /// Effective credibility of the matched record, when there was one.
    pub effective_credibility: Option<Credibility>,
}

impl ResolutionAction {
    #[must_use]
    pub const fn action_type(&self) -> ActionType {
        match self.outcome {
            Outcome::Insert { .. } => ActionType::Insert,
            Outcome::Reinforce { .. } => ActionType::Reinforce,
            Outcome::Supersede { .. } => ActionType::Supersede,
            Outcome::Ignore { .. } => ActionType::Ignore,
            Outcome::Error { .. } => ActionType::Error,
        }
    }

    /// The record that existed before this action, if any.
    #[must_use]
    pub const fn old_behavior_id(&self) -> Option<BehaviorId> {
        match self.outcome {
            Outcome::Insert { .. } => None,
            Outcome::Reinforce { behavior_id, .. } | Outcome::Ignore { behavior_id, .. } => {
                Some(behavior_id)
            }
            Outcome::Supersede { old_id, .. } => Some(old_id),
            Outcome::Error { behavior_id, .. } => behavior_id,
        }
    }

    /// The record that is ACTIVE after this action, if the action produced or kept one.
    #[must_use]
    pub const fn new_behavior_id(&self) -> Option<BehaviorId> {
        match self.outcome {
            Outcome::Insert { new_id } | Outcome::Supersede { new_id, .. } => Some(new_id),
            Outcome::Reinforce { behavior_id, .. } => Some(behavior_id),
            Outcome::Ignore { .. } | Outcome::Error { .. } => None,
        }
    }

    /// True only for a SUPERSEDE triggered by signal accumulation.
    #[must_use]
    pub const fn forced_by_drift(&self) -> bool {
        matches!(
            self.outcome,
            Outcome::Supersede {
                forced_by_drift: true,
                ..
            }
        )
    }

    #[must_use]
    pub const fn drift_type(&self) -> Option<DriftType> {
        match self.outcome {
            Outcome::Supersede { drift_type, .. } | Outcome::Ignore { drift_type, .. } => {
                Some(drift_type)
            }
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error { .. })
    }
}

/// Flat serialized form of a [`ResolutionAction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub reason: String,
    pub details: String,
    pub old_behavior_id: Option<BehaviorId>,
    pub new_behavior_id: Option<BehaviorId>,
    pub forced_by_drift: bool,
    pub effective_credibility: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_type: Option<DriftType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<SignalId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl From<ResolutionAction> for ActionRecord {
    fn from(action: ResolutionAction) -> Self {
        let signal_id = match action.outcome {
            Outcome::Ignore { signal_id, .. } => Some(signal_id),
            _ => None,
        };
        let error_kind = match action.outcome {
            Outcome::Error { kind, .. } => Some(kind.to_string()),
            _ => None,
        };
        Self {
            action_type: action.action_type(),
            old_behavior_id: action.old_behavior_id(),
            new_behavior_id: action.new_behavior_id(),
            forced_by_drift: action.forced_by_drift(),
            effective_credibility: action.effective_credibility.map(Credibility::value),
            drift_type: action.drift_type(),
            signal_id,
            error_kind,
            reason: action.reason,
            details: action.details,
        }
    }
}

/// Result of processing one [`BatchRequest`](crate::candidate::BatchRequest).
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub status: &'static str,
    pub user_id: String,
    /// One entry per candidate, in request order.
    pub actions: Vec<ResolutionAction>,
    pub processed_count: usize,
    pub timestamp: DateTime<Utc>,
}

impl BatchResponse {
    #[must_use]
    pub fn processed(user_id: impl Into<String>, actions: Vec<ResolutionAction>) -> Self {
        Self {
            status: "PROCESSED",
            user_id: user_id.into(),
            processed_count: actions.len(),
            actions,
            timestamp: Utc::now(),
        }
    }

    /// Number of actions of the given type.
    #[must_use]
    pub fn count_of(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type() == action_type)
            .count()
    }
}
