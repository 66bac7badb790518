//! Resolution engine.
//!
//! Applies the decision tree in [`policy`] to each candidate of a batch,
//! against pluggable storage backends. The engine holds no mutable state of
//! its own; every write goes through a guarded store call.

mod policy;
mod retry;

/// User-affinity worker runtime.
pub mod runtime;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::action::{ActionType, BatchResponse, Outcome, ResolutionAction};
use crate::behavior::{BehaviorId, BehaviorRecord, BehaviorState};
use crate::candidate::{BatchRequest, Candidate, ValidCandidate};
use crate::config::ResolutionConfig;
use crate::drift::{AnalysisParams, DriftAnalysis};
use crate::error::{ConfigError, DriftResult, ResolutionError, ValidationError};
use crate::signal::DriftSignal;
use crate::storage::{
    BehaviorFilter, BehaviorStore, CasOutcome, InMemoryStores, Page, PageRequest, Reinforcement,
    SemanticMatch, SemanticMatcher, SignalStore, StorageError,
};

pub use policy::{decide, Decision};
use retry::with_retry;

/// Match-and-apply rounds per candidate. The second round re-matches after a
/// lost compare-and-set.
const MAX_MATCH_ROUNDS: u32 = 2;

/// Result of one match-and-apply round.
enum Step {
    Done(ResolutionAction),
    Conflict {
        behavior_id: BehaviorId,
        current: BehaviorState,
    },
}

/// The drift-aware resolution engine.
pub struct ResolutionEngine {
    config: ResolutionConfig,
    behaviors: Arc<dyn BehaviorStore>,
    matcher: Arc<dyn SemanticMatcher>,
    signals: Arc<dyn SignalStore>,
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResolutionEngine {
    /// Creates an engine over the given stores.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration is invalid or if the
    /// behavior store already holds embeddings of a different dimension.
    pub fn new(
        config: ResolutionConfig,
        behaviors: Arc<dyn BehaviorStore>,
        matcher: Arc<dyn SemanticMatcher>,
        signals: Arc<dyn SignalStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        if let Some(stored) = behaviors.embedding_dimension() {
            if stored != config.embedding_dimension {
                return Err(ConfigError::DimensionMismatch {
                    configured: config.embedding_dimension,
                    stored,
                });
            }
        }

        tracing::info!(
            half_life_days = config.decay_half_life_days,
            signal_threshold = config.drift_signal_threshold,
            window_days = config.drift_signal_window_days,
            gate = config.semantic_gate_threshold,
            dimension = config.embedding_dimension,
            "resolution engine started"
        );

        Ok(Self {
            config,
            behaviors,
            matcher,
            signals,
        })
    }

    /// Creates an engine over a bundle of in-memory stores.
    ///
    /// # Errors
    ///
    /// Same as [`ResolutionEngine::new`].
    pub fn with_stores(
        config: ResolutionConfig,
        stores: &InMemoryStores,
    ) -> Result<Self, ConfigError> {
        let behaviors: Arc<dyn BehaviorStore> = stores.behaviors.clone();
        let matcher: Arc<dyn SemanticMatcher> = stores.behaviors.clone();
        let signals: Arc<dyn SignalStore> = stores.signals.clone();
        Self::new(config, behaviors, matcher, signals)
    }

    /// Creates an engine and a fresh in-memory ledger sized to the configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration is invalid.
    pub fn in_memory(config: ResolutionConfig) -> Result<(Self, InMemoryStores), ConfigError> {
        let stores = InMemoryStores::with_dimension(config.embedding_dimension);
        let engine = Self::with_stores(config, &stores)?;
        Ok((engine, stores))
    }

    #[must_use]
    pub const fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Resolves every candidate of a batch, in order.
    ///
    /// Never fails as a whole: a candidate that cannot be resolved yields an
    /// ERROR action and the rest of the batch carries on.
    pub fn process_batch(&self, request: &BatchRequest) -> BatchResponse {
        let actions: Vec<ResolutionAction> = request
            .candidates
            .iter()
            .map(|candidate| self.process_candidate(&request.user_id, candidate, request.timestamp))
            .collect();

        let response = BatchResponse::processed(request.user_id.clone(), actions);
        tracing::info!(
            user_id = %request.user_id,
            processed = response.processed_count,
            errors = response.count_of(ActionType::Error),
            "batch processed"
        );
        response
    }

    /// Resolves one candidate.
    ///
    /// `batch_time` is used as the observation time when the candidate does
    /// not carry its own.
    pub fn process_candidate(
        &self,
        user_id: &str,
        candidate: &Candidate,
        batch_time: DateTime<Utc>,
    ) -> ResolutionAction {
        let result = if user_id.trim().is_empty() {
            Err(ResolutionError::Validation(ValidationError::MissingField {
                field: "user_id".to_string(),
            }))
        } else {
            candidate
                .validate(self.config.embedding_dimension, batch_time)
                .map_err(ResolutionError::from)
                .and_then(|valid| self.resolve(user_id, &valid))
        };

        result.unwrap_or_else(|err| error_action(user_id, &err))
    }

    /// Resolves an already validated candidate.
    ///
    /// # Errors
    ///
    /// Returns a `ResolutionError` when store calls fail permanently, retries
    /// are exhausted, or the compare-and-set guard keeps losing.
    pub fn resolve(
        &self,
        user_id: &str,
        candidate: &ValidCandidate,
    ) -> Result<ResolutionAction, ResolutionError> {
        let mut last_conflict = None;

        for round in 1..=MAX_MATCH_ROUNDS {
            let matches = with_retry(&self.config.retry, "find_candidates", || {
                self.matcher.find_candidates(
                    user_id,
                    &candidate.embedding,
                    self.config.semantic_gate_threshold,
                    self.config.max_semantic_candidates,
                )
            })?;

            let Some(nearest) = matches.into_iter().next() else {
                return self.insert(user_id, candidate);
            };

            match self.apply(user_id, candidate, nearest)? {
                Step::Done(action) => return Ok(action),
                Step::Conflict {
                    behavior_id,
                    current,
                } => {
                    tracing::warn!(
                        user_id,
                        behavior_id = %behavior_id,
                        current = %current,
                        round,
                        "behavior changed concurrently, re-matching"
                    );
                    last_conflict = Some((behavior_id, current));
                }
            }
        }

        let (behavior_id, current) =
            last_conflict.unwrap_or((BehaviorId::default(), BehaviorState::Active));
        Err(ResolutionError::ConcurrencyConflict {
            behavior_id,
            current,
            attempts: MAX_MATCH_ROUNDS,
        })
    }

    fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            half_life_days: self.config.decay_half_life_days,
            signal_threshold: self.config.drift_signal_threshold,
            window_days: self.config.drift_signal_window_days,
        }
    }

    fn insert(
        &self,
        user_id: &str,
        candidate: &ValidCandidate,
    ) -> Result<ResolutionAction, ResolutionError> {
        let record = BehaviorRecord::from_candidate(user_id, candidate);
        let new_id = record.id;
        if let Err(err) =
            with_retry(&self.config.retry, "insert", || self.behaviors.insert(record.clone()))
        {
            // A retried insert can collide with its own earlier attempt.
            let own_write = matches!(err, ResolutionError::Storage(StorageError::DuplicateKey(_)))
                && self.insert_landed(&record)?;
            if !own_write {
                return Err(err);
            }
            tracing::debug!(
                behavior_id = %new_id,
                "insert already committed by an earlier attempt"
            );
        }

        tracing::info!(user_id, behavior_id = %new_id, target = %candidate.target, "INSERT");
        Ok(ResolutionAction {
            outcome: Outcome::Insert { new_id },
            reason: "No conflicting behavior found".to_string(),
            details: format!("Created new behavior for: {}", candidate.target),
            effective_credibility: None,
        })
    }

    fn apply(
        &self,
        user_id: &str,
        candidate: &ValidCandidate,
        nearest: SemanticMatch,
    ) -> Result<Step, ResolutionError> {
        let existing = nearest.record;
        let now = candidate.observed_at;

        let signal_count = with_retry(&self.config.retry, "count_recent", || {
            self.signals
                .count_recent(existing.id, self.config.drift_signal_window_days, now)
        })?;

        let analysis = DriftAnalysis::analyze(&existing, now, signal_count, self.analysis_params());
        let effective = analysis.effective();

        tracing::debug!(
            behavior_id = %existing.id,
            distance = nearest.distance,
            stored = existing.credibility.value(),
            effective = effective.value(),
            elapsed_days = analysis.decay.elapsed_days,
            signal_count,
            "matched existing behavior"
        );
        if analysis.decay.future_dated {
            tracing::warn!(
                behavior_id = %existing.id,
                last_seen_at = %existing.last_seen_at,
                observed_at = %now,
                "behavior last seen after the candidate was observed"
            );
        }

        let step = match decide(&existing, candidate, &analysis) {
            Decision::Supersede {
                forced_by_drift,
                drift_type,
            } => {
                let new_record = BehaviorRecord::from_candidate(user_id, candidate);
                let new_id = new_record.id;
                let outcome = with_retry(&self.config.retry, "try_supersede", || {
                    self.behaviors.try_supersede(existing.id, new_record.clone())
                })?;
                if let CasOutcome::Conflict { current } = outcome {
                    if !self.supersede_landed(existing.id, new_id)? {
                        return Ok(Step::Conflict {
                            behavior_id: existing.id,
                            current,
                        });
                    }
                    tracing::debug!(
                        old_id = %existing.id,
                        new_id = %new_id,
                        "supersede already committed by an earlier attempt"
                    );
                }

                let reason = if forced_by_drift {
                    "Drift accumulation forced update".to_string()
                } else {
                    format!(
                        "New credibility ({}) exceeded decayed existing ({effective})",
                        candidate.credibility
                    )
                };
                tracing::info!(
                    user_id,
                    old_id = %existing.id,
                    new_id = %new_id,
                    forced_by_drift,
                    drift_type = %drift_type,
                    "SUPERSEDE"
                );
                Step::Done(ResolutionAction {
                    outcome: Outcome::Supersede {
                        old_id: existing.id,
                        new_id,
                        forced_by_drift,
                        drift_type,
                    },
                    reason,
                    details: with_clock_note(
                        format!("Drift type: {drift_type}. {}", analysis.reason),
                        analysis.decay.future_dated,
                    ),
                    effective_credibility: Some(effective),
                })
            }
            Decision::Reinforce => {
                let update = Reinforcement {
                    credibility: candidate.credibility,
                    seen_at: now,
                };
                let outcome = with_retry(&self.config.retry, "reinforce", || {
                    self.behaviors.reinforce(existing.id, update)
                })?;
                let updated = match outcome {
                    CasOutcome::Committed(updated) => updated,
                    CasOutcome::Conflict { current } => {
                        return Ok(Step::Conflict {
                            behavior_id: existing.id,
                            current,
                        });
                    }
                };

                tracing::info!(
                    user_id,
                    behavior_id = %existing.id,
                    count = updated.reinforcement_count,
                    "REINFORCE"
                );
                Step::Done(ResolutionAction {
                    outcome: Outcome::Reinforce {
                        behavior_id: existing.id,
                        reinforcement_count: updated.reinforcement_count,
                    },
                    reason: format!(
                        "Behavior reinforced (occurrence #{})",
                        updated.reinforcement_count
                    ),
                    details: with_clock_note(
                        format!(
                            "Credibility updated from {} to {}",
                            existing.credibility, updated.credibility
                        ),
                        analysis.decay.future_dated,
                    ),
                    effective_credibility: Some(effective),
                })
            }
            Decision::Ignore { drift_type } => {
                let signal = DriftSignal::rejected(user_id, existing.id, candidate, drift_type);
                let signal_id = signal.id;
                match with_retry(&self.config.retry, "append_signal", || {
                    self.signals.append(signal.clone())
                }) {
                    // Signal ids are fresh per candidate, so a duplicate is an
                    // earlier attempt of this same append.
                    Ok(()) | Err(ResolutionError::Storage(StorageError::DuplicateKey(_))) => {}
                    Err(err) => return Err(err),
                }

                tracing::info!(
                    user_id,
                    behavior_id = %existing.id,
                    signal_id = %signal_id,
                    drift_type = %drift_type,
                    signal_count = signal_count + 1,
                    "IGNORE"
                );
                Step::Done(ResolutionAction {
                    outcome: Outcome::Ignore {
                        behavior_id: existing.id,
                        signal_id,
                        drift_type,
                    },
                    reason: format!(
                        "New credibility ({}) below existing ({effective})",
                        candidate.credibility
                    ),
                    details: with_clock_note(
                        format!("Drift signal logged. Count: {}", signal_count + 1),
                        analysis.decay.future_dated,
                    ),
                    effective_credibility: Some(effective),
                })
            }
        };

        Ok(step)
    }

    /// True if `record` is already stored for the same user.
    fn insert_landed(&self, record: &BehaviorRecord) -> Result<bool, ResolutionError> {
        let stored = with_retry(&self.config.retry, "get", || self.behaviors.get(record.id))?;
        Ok(stored.is_some_and(|s| s.user_id == record.user_id && s.target == record.target))
    }

    /// True if `old_id` is already superseded by `new_id`.
    fn supersede_landed(
        &self,
        old_id: BehaviorId,
        new_id: BehaviorId,
    ) -> Result<bool, ResolutionError> {
        let old = with_retry(&self.config.retry, "get", || self.behaviors.get(old_id))?;
        Ok(old.is_some_and(|r| r.superseded_by == Some(new_id)))
    }

    /// Fetches one behavior record.
    ///
    /// # Errors
    ///
    /// Returns `DriftError::Resolution` if the store call fails.
    pub fn get_behavior(&self, id: BehaviorId) -> DriftResult<Option<BehaviorRecord>> {
        Ok(with_retry(&self.config.retry, "get", || self.behaviors.get(id))?)
    }

    /// Lists a user's behaviors, newest `last_seen_at` first.
    ///
    /// # Errors
    ///
    /// Returns `DriftError::Validation` for an empty user id and
    /// `DriftError::Resolution` if the store call fails.
    pub fn list_behaviors(
        &self,
        user_id: &str,
        filter: &BehaviorFilter,
        page: PageRequest,
    ) -> DriftResult<Page<BehaviorRecord>> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "user_id".to_string(),
            }
            .into());
        }
        // Re-check in case the request was built without `PageRequest::new`.
        let page = PageRequest::new(page.offset, page.limit)?;
        Ok(with_retry(&self.config.retry, "list", || {
            self.behaviors.list(user_id, filter, page)
        })?)
    }

    /// Recent drift signals against one behavior, newest first.
    ///
    /// `window_days` defaults to the configured drift window.
    ///
    /// # Errors
    ///
    /// Returns `DriftError::Validation` for a limit outside `[1, 500]`.
    pub fn recent_signals(
        &self,
        behavior_id: BehaviorId,
        window_days: Option<f64>,
        limit: usize,
    ) -> DriftResult<Vec<DriftSignal>> {
        let limit = PageRequest::new(0, limit)?.limit;
        let window = self.window_or_default(window_days);
        let now = Utc::now();
        Ok(with_retry(&self.config.retry, "recent_for_behavior", || {
            self.signals.recent_for_behavior(behavior_id, window, now, limit)
        })?)
    }

    /// Recent drift signals across all of a user's behaviors, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DriftError::Validation` for a limit outside `[1, 500]`.
    pub fn user_signals(
        &self,
        user_id: &str,
        window_days: Option<f64>,
        limit: usize,
    ) -> DriftResult<Vec<DriftSignal>> {
        let limit = PageRequest::new(0, limit)?.limit;
        let window = self.window_or_default(window_days);
        let now = Utc::now();
        Ok(with_retry(&self.config.retry, "recent_for_user", || {
            self.signals.recent_for_user(user_id, window, now, limit)
        })?)
    }

    /// Administratively flags an ACTIVE behavior.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::ConcurrencyConflict` (wrapped) if the record
    /// is no longer ACTIVE, or a storage error if it does not exist.
    pub fn flag(&self, id: BehaviorId) -> DriftResult<BehaviorRecord> {
        match with_retry(&self.config.retry, "flag", || self.behaviors.flag(id))? {
            CasOutcome::Committed(record) => {
                tracing::info!(behavior_id = %id, "FLAGGED");
                Ok(record)
            }
            CasOutcome::Conflict { current } => Err(ResolutionError::ConcurrencyConflict {
                behavior_id: id,
                current,
                attempts: 1,
            }
            .into()),
        }
    }

    fn window_or_default(&self, window_days: Option<f64>) -> f64 {
        window_days
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(self.config.drift_signal_window_days)
    }
}

fn with_clock_note(details: String, future_dated: bool) -> String {
    if future_dated {
        format!("{details} Note: existing behavior was last seen after this observation.")
    } else {
        details
    }
}

fn error_action(user_id: &str, err: &ResolutionError) -> ResolutionAction {
    let behavior_id = match err {
        ResolutionError::ConcurrencyConflict { behavior_id, .. } => Some(*behavior_id),
        _ => None,
    };
    tracing::warn!(user_id, kind = err.kind(), error = %err, "ERROR");
    ResolutionAction {
        outcome: Outcome::Error {
            kind: err.kind(),
            behavior_id,
        },
        reason: format!("Candidate could not be resolved ({})", err.kind()),
        details: err.to_string(),
        effective_credibility: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Polarity;
    use crate::config::RetryConfig;
    use chrono::Duration;

    fn config() -> ResolutionConfig {
        ResolutionConfig {
            embedding_dimension: 3,
            retry: RetryConfig::immediate(2),
            ..ResolutionConfig::default()
        }
    }

    fn candidate(target: &str, credibility: f64, embedding: [f32; 3]) -> Candidate {
        Candidate {
            intent: "PREFERENCE".to_string(),
            target: target.to_string(),
            context: "general".to_string(),
            polarity: Polarity::Positive,
            credibility,
            embedding: embedding.to_vec(),
            observed_at: None,
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let bad = ResolutionConfig {
            decay_half_life_days: 0.0,
            ..config()
        };
        assert!(ResolutionEngine::in_memory(bad).is_err());
    }

    #[test]
    fn rejects_store_dimension_mismatch() {
        let stores = InMemoryStores::with_dimension(8);
        let err = ResolutionEngine::with_stores(config(), &stores).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DimensionMismatch {
                configured: 3,
                stored: 8
            }
        ));
    }

    #[test]
    fn insert_then_reinforce() {
        let (engine, _stores) = ResolutionEngine::in_memory(config()).unwrap();
        let now = Utc::now();

        let first = engine.process_candidate("u1", &candidate("Rust", 0.7, [1.0, 0.0, 0.0]), now);
        assert_eq!(first.action_type(), ActionType::Insert);
        assert_eq!(first.reason, "No conflicting behavior found");
        assert_eq!(first.details, "Created new behavior for: Rust");

        let second = engine.process_candidate("u1", &candidate("rust", 0.7, [1.0, 0.0, 0.0]), now);
        assert_eq!(second.action_type(), ActionType::Reinforce);
        assert_eq!(second.reason, "Behavior reinforced (occurrence #2)");
        assert_eq!(second.old_behavior_id(), first.new_behavior_id());
    }

    #[test]
    fn invalid_candidate_becomes_error_action() {
        let (engine, stores) = ResolutionEngine::in_memory(config()).unwrap();
        let action = engine.process_candidate(
            "u1",
            &candidate("Rust", 1.5, [1.0, 0.0, 0.0]),
            Utc::now(),
        );
        assert!(action.is_error());
        assert_eq!(action.old_behavior_id(), None);
        assert!(matches!(action.outcome, Outcome::Error { kind: "validation", .. }));
        assert!(stores.behaviors.is_empty().unwrap());

        let action = engine.process_candidate(
            "  ",
            &candidate("Rust", 0.5, [1.0, 0.0, 0.0]),
            Utc::now(),
        );
        assert!(action.is_error());
    }

    #[test]
    fn future_dated_match_is_noted() {
        let (engine, _stores) = ResolutionEngine::in_memory(config()).unwrap();
        let now = Utc::now();
        engine.process_candidate("u1", &candidate("Rust", 0.9, [1.0, 0.0, 0.0]), now);

        let mut earlier = candidate("Go", 0.1, [1.0, 0.05, 0.0]);
        earlier.observed_at = Some(now - Duration::days(2));
        let action = engine.process_candidate("u1", &earlier, now);
        assert_eq!(action.action_type(), ActionType::Ignore);
        assert!(action.details.contains("last seen after this observation"));
    }

    #[test]
    fn flag_is_guarded() {
        let (engine, _stores) = ResolutionEngine::in_memory(config()).unwrap();
        let action = engine.process_candidate(
            "u1",
            &candidate("Rust", 0.9, [1.0, 0.0, 0.0]),
            Utc::now(),
        );
        let id = action.new_behavior_id().unwrap();

        let flagged = engine.flag(id).unwrap();
        assert_eq!(flagged.state, BehaviorState::Flagged);
        let err = engine.flag(id).unwrap_err();
        assert!(err.is_retryable());

        // A flagged record no longer matches, so the next candidate inserts.
        let next = engine.process_candidate(
            "u1",
            &candidate("Rust", 0.9, [1.0, 0.0, 0.0]),
            Utc::now(),
        );
        assert_eq!(next.action_type(), ActionType::Insert);
    }

    #[test]
    fn signal_queries_validate_limit() {
        let (engine, _stores) = ResolutionEngine::in_memory(config()).unwrap();
        assert!(engine.recent_signals(BehaviorId::new(), None, 0).unwrap_err().is_validation());
        assert!(engine.user_signals("u1", None, 501).unwrap_err().is_validation());
        assert!(engine.user_signals("u1", Some(-1.0), 10).unwrap().is_empty());
    }
}
