//! Behavior records, the persisted unit of the behavior ledger.
//!
//! A behavior record is one belief about a user: "prefers Python for
//! backend work", "dislikes tabs". Records are append-only history. The only
//! in-place mutation is reinforcement of an ACTIVE record; every other change
//! is a state transition that leaves the old record behind.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::ValidCandidate;
use crate::credibility::Credibility;

/// Unique identifier for a behavior record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorId(Uuid);

impl BehaviorId {
    /// Creates a new random behavior ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BehaviorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for BehaviorId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Sentiment of a behavior toward its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    /// Returns true if the two polarities are POSITIVE/NEGATIVE and opposite.
    ///
    /// NEUTRAL is never opposite to anything.
    #[must_use]
    pub const fn is_opposite(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Positive, Self::Negative) | (Self::Negative, Self::Positive)
        )
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "POSITIVE"),
            Self::Negative => write!(f, "NEGATIVE"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Lifecycle state of a behavior record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BehaviorState {
    /// The current belief for its semantic cluster.
    Active,
    /// Replaced by a newer record (see `superseded_by`). Terminal.
    Superseded,
    /// Set aside administratively. Terminal.
    Flagged,
}

impl Default for BehaviorState {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Superseded => write!(f, "SUPERSEDED"),
            Self::Flagged => write!(f, "FLAGGED"),
        }
    }
}

/// One belief instance in a user's behavior ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorRecord {
    pub id: BehaviorId,
    pub user_id: String,
    pub intent: String,
    pub target: String,
    pub context: String,
    pub polarity: Polarity,
    pub credibility: Credibility,

    /// Number of observations folded into this record. Always >= 1.
    pub reinforcement_count: u32,

    pub state: BehaviorState,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<BehaviorId>,
}

impl BehaviorRecord {
    /// Builds a fresh ACTIVE record from a validated candidate.
    ///
    /// Used for both INSERT and the new side of SUPERSEDE.
    #[must_use]
    pub fn from_candidate(user_id: impl Into<String>, candidate: &ValidCandidate) -> Self {
        Self {
            id: BehaviorId::new(),
            user_id: user_id.into(),
            intent: candidate.intent.clone(),
            target: candidate.target.clone(),
            context: candidate.context.clone(),
            polarity: candidate.polarity,
            credibility: candidate.credibility,
            reinforcement_count: 1,
            state: BehaviorState::Active,
            embedding: candidate.embedding.clone(),
            created_at: candidate.observed_at,
            last_seen_at: candidate.observed_at,
            superseded_by: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == BehaviorState::Active
    }

    /// Returns true if intent, target, context and polarity all match.
    ///
    /// Targets compare case-insensitively; the other fields are exact.
    #[must_use]
    pub fn same_fields_as(&self, candidate: &ValidCandidate) -> bool {
        self.intent == candidate.intent
            && self.target_matches(&candidate.target)
            && self.context == candidate.context
            && self.polarity == candidate.polarity
    }

    /// Case-insensitive target comparison.
    #[must_use]
    pub fn target_matches(&self, target: &str) -> bool {
        self.target.trim().to_lowercase() == target.trim().to_lowercase()
    }

    /// Folds one more observation into this record.
    ///
    /// Credibility never decreases; the count always increments.
    pub fn apply_reinforcement(&mut self, credibility: Credibility, seen_at: DateTime<Utc>) {
        self.credibility = self.credibility.max(credibility);
        self.reinforcement_count = self.reinforcement_count.saturating_add(1);
        self.last_seen_at = seen_at;
    }

    /// Marks this record as superseded by another.
    pub fn mark_superseded(&mut self, by: BehaviorId) {
        self.state = BehaviorState::Superseded;
        self.superseded_by = Some(by);
    }

    /// Marks this record as flagged.
    pub fn mark_flagged(&mut self) {
        self.state = BehaviorState::Flagged;
    }
}

impl PartialEq for BehaviorRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BehaviorRecord {}
