//! Abstract storage traits for KyroDrift.
//!
//! These traits are the contract between the resolution engine and whatever
//! holds the ledger. The engine owns the transition rules; the store owns
//! atomicity. In particular the compare-and-set guard on SUPERSEDE and
//! REINFORCE is part of the signature ([`CasOutcome`]), not an implicit
//! unit-of-work.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::behavior::{BehaviorId, BehaviorRecord, BehaviorState};
use crate::credibility::Credibility;
use crate::error::ValidationError;
use crate::signal::DriftSignal;

/// Errors that can occur during storage operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Behavior not found.
    #[error("Behavior not found: {0}")]
    BehaviorNotFound(BehaviorId),

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The call did not complete in time.
    #[error("Store call '{operation}' timed out after {duration_ms}ms")]
    Timeout {
        operation: &'static str,
        duration_ms: u64,
    },

    /// The backend could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Embedding length differs from what the store holds.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
    },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Returns true if the same call may succeed when retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

/// Result of a guarded state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome<T> {
    /// The record was still ACTIVE and the transition committed.
    Committed(T),
    /// The record was no longer ACTIVE; nothing was written.
    Conflict {
        current: BehaviorState,
    },
}

impl<T> CasOutcome<T> {
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// In-place update applied by REINFORCE.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reinforcement {
    /// Candidate credibility; the stored value becomes the max of the two.
    pub credibility: Credibility,
    pub seen_at: DateTime<Utc>,
}

/// A behavior close enough to a candidate embedding.
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub record: BehaviorRecord,
    /// Cosine distance in `[0, 2]`; smaller is closer.
    pub distance: f32,
}

/// Filter for ledger listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BehaviorState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl BehaviorFilter {
    /// Only ACTIVE records.
    #[must_use]
    pub fn active() -> Self {
        Self {
            state: Some(BehaviorState::Active),
            intent: None,
        }
    }

    #[must_use]
    pub fn matches(&self, record: &BehaviorRecord) -> bool {
        self.state.map_or(true, |s| record.state == s)
            && self.intent.as_deref().map_or(true, |i| record.intent == i)
    }
}

/// Offset pagination request. Listings are never unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    /// Largest page a caller may ask for.
    pub const MAX_LIMIT: usize = 500;

    /// Default page size.
    pub const DEFAULT_LIMIT: usize = 50;

    /// Creates a validated page request.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPageLimit` unless `1 <= limit <= MAX_LIMIT`.
    pub fn new(offset: usize, limit: usize) -> Result<Self, ValidationError> {
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(ValidationError::InvalidPageLimit {
                limit,
                max: Self::MAX_LIMIT,
            });
        }
        Ok(Self { offset, limit })
    }

    /// The page after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.offset.saturating_add(self.items.len()) < self.total
    }
}

/// Start of a counting window ending at `now`.
///
/// A window reaching past the earliest representable instant starts there,
/// so it covers everything before `now`.
#[must_use]
pub fn window_start(now: DateTime<Utc>, window_days: f64) -> DateTime<Utc> {
    #[allow(clippy::cast_possible_truncation)]
    let millis = (window_days * 86_400_000.0).round() as i64;
    TimeDelta::try_milliseconds(millis)
        .and_then(|width| now.checked_sub_signed(width))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Nearest-neighbour lookup over a user's ACTIVE behaviors.
pub trait SemanticMatcher: Send + Sync {
    /// Returns ACTIVE records of `user_id` with distance `<= distance_threshold`,
    /// nearest first, at most `max_results`.
    fn find_candidates(
        &self,
        user_id: &str,
        embedding: &[f32],
        distance_threshold: f32,
        max_results: usize,
    ) -> Result<Vec<SemanticMatch>, StorageError>;
}

/// Storage trait for the behavior ledger.
///
/// # Safety Considerations
/// - `try_supersede` must apply both of its writes or neither
/// - Guarded transitions must check the state at commit time, under the same
///   lock or transaction as the write
/// - After a transient error the engine resends the same record id. A write
///   that committed before the error was reported must then surface as
///   `DuplicateKey` (insert) or `Conflict` with `superseded_by` set to that id
///   (supersede), never as a second copy
pub trait BehaviorStore: Send + Sync {
    /// Dimension of stored embeddings, if the store has fixed one.
    fn embedding_dimension(&self) -> Option<usize>;

    /// Insert a new record. Returns error if the ID already exists.
    fn insert(&self, record: BehaviorRecord) -> Result<(), StorageError>;

    /// Get a record by ID.
    fn get(&self, id: BehaviorId) -> Result<Option<BehaviorRecord>, StorageError>;

    /// Marks `old_id` SUPERSEDED by `new_record` and inserts `new_record`,
    /// atomically, but only if `old_id` is still ACTIVE.
    ///
    /// Returns the stored new record on commit.
    fn try_supersede(
        &self,
        old_id: BehaviorId,
        new_record: BehaviorRecord,
    ) -> Result<CasOutcome<BehaviorRecord>, StorageError>;

    /// Reinforces `id` in place if it is still ACTIVE.
    ///
    /// Returns the updated record on commit.
    fn reinforce(
        &self,
        id: BehaviorId,
        update: Reinforcement,
    ) -> Result<CasOutcome<BehaviorRecord>, StorageError>;

    /// Administrative ACTIVE -> FLAGGED transition.
    fn flag(&self, id: BehaviorId) -> Result<CasOutcome<BehaviorRecord>, StorageError>;

    /// Lists a user's records, newest `last_seen_at` first.
    fn list(
        &self,
        user_id: &str,
        filter: &BehaviorFilter,
        page: PageRequest,
    ) -> Result<Page<BehaviorRecord>, StorageError>;
}

/// Append-only log of drift signals.
///
/// Reads must observe every append that returned `Ok`, including appends
/// made earlier in the same batch.
pub trait SignalStore: Send + Sync {
    /// Append a signal. Returns `DuplicateKey` if the ID already exists,
    /// which is also how a resent append after a lost acknowledgement must
    /// surface.
    fn append(&self, signal: DriftSignal) -> Result<(), StorageError>;

    /// Signals against `behavior_id` with `attempted_at >= now - window_days`.
    fn count_recent(
        &self,
        behavior_id: BehaviorId,
        window_days: f64,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError>;

    /// Recent signals against one behavior, newest first.
    fn recent_for_behavior(
        &self,
        behavior_id: BehaviorId,
        window_days: f64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DriftSignal>, StorageError>;

    /// Recent signals for a user across all behaviors, newest first.
    fn recent_for_user(
        &self,
        user_id: &str,
        window_days: f64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DriftSignal>, StorageError>;
}
