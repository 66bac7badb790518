//! In-memory storage backend.
//!
//! Thread-safe implementations of the storage traits. Used for embedded
//! usage, tests, the replay binary, and as the reference semantics for
//! guarded transitions: every guard is checked under the same write lock as
//! the write it protects.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::behavior::{BehaviorId, BehaviorRecord, BehaviorState};
use crate::signal::{DriftSignal, SignalId};
use crate::storage::traits::{
    window_start, BehaviorFilter, BehaviorStore, CasOutcome, Page, PageRequest, Reinforcement,
    SemanticMatch, SemanticMatcher, SignalStore, StorageError,
};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

/// Cosine distance (`1 - cosine similarity`), in `[0, 2]`.
///
/// Zero vectors are treated as maximally distant from everything.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32, StorageError> {
    if a.len() != b.len() {
        return Err(StorageError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let xf = f64::from(x);
        let yf = f64::from(y);
        dot += xf * yf;
        norm_a += xf * xf;
        norm_b += yf * yf;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return Ok(2.0);
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if !sim.is_finite() {
        return Ok(2.0);
    }

    #[allow(clippy::cast_possible_truncation)]
    Ok((1.0 - sim.clamp(-1.0, 1.0)) as f32)
}

fn ensure_embedding_dim(expected: &mut Option<usize>, actual: usize) -> Result<(), StorageError> {
    match expected {
        None => {
            if actual == 0 {
                return Err(StorageError::Backend(
                    "embedding dimension must be non-zero".to_string(),
                ));
            }
            *expected = Some(actual);
            Ok(())
        }
        Some(exp) if *exp == actual => Ok(()),
        Some(exp) => Err(StorageError::DimensionMismatch {
            expected: *exp,
            actual,
        }),
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    by_id: HashMap<BehaviorId, BehaviorRecord>,
    by_user: HashMap<String, Vec<BehaviorId>>,
    embedding_dim: Option<usize>,
}

impl LedgerState {
    fn index_insert(&mut self, record: BehaviorRecord) {
        self.by_user
            .entry(record.user_id.clone())
            .or_default()
            .push(record.id);
        self.by_id.insert(record.id, record);
    }

    fn user_records<'a>(&'a self, user_id: &str) -> impl Iterator<Item = &'a BehaviorRecord> + 'a {
        self.by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.by_id.get(id))
    }
}

/// Thread-safe in-memory behavior ledger.
///
/// Also implements [`SemanticMatcher`] with a linear cosine-distance scan.
#[derive(Debug, Default)]
pub struct InMemoryBehaviorStore {
    state: RwLock<LedgerState>,
}

impl InMemoryBehaviorStore {
    /// Create a new empty store. The first insert fixes the embedding dimension.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a fixed embedding dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            state: RwLock::new(LedgerState {
                embedding_dim: Some(dimension),
                ..LedgerState::default()
            }),
        }
    }

    /// Number of records in any state. Intended for tests and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("behavior.len"))?;
        Ok(state.by_id.len())
    }

    /// Returns true if the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// All records of a user, any state, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the lock is poisoned.
    pub fn snapshot(&self, user_id: &str) -> Result<Vec<BehaviorRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("behavior.snapshot"))?;
        let mut records: Vec<BehaviorRecord> = state.user_records(user_id).cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Guarded transition shared by reinforce and flag.
    fn transition<F>(
        &self,
        id: BehaviorId,
        context: &'static str,
        apply: F,
    ) -> Result<CasOutcome<BehaviorRecord>, StorageError>
    where
        F: FnOnce(&mut BehaviorRecord),
    {
        let mut state = self.state.write().map_err(|_| lock_err(context))?;
        let record = state
            .by_id
            .get_mut(&id)
            .ok_or(StorageError::BehaviorNotFound(id))?;

        if record.state != BehaviorState::Active {
            return Ok(CasOutcome::Conflict {
                current: record.state,
            });
        }

        apply(record);
        Ok(CasOutcome::Committed(record.clone()))
    }
}

impl BehaviorStore for InMemoryBehaviorStore {
    fn embedding_dimension(&self) -> Option<usize> {
        self.state.read().ok().and_then(|s| s.embedding_dim)
    }

    fn insert(&self, record: BehaviorRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("behavior.insert"))?;
        if state.by_id.contains_key(&record.id) {
            return Err(StorageError::DuplicateKey(record.id.to_string()));
        }
        ensure_embedding_dim(&mut state.embedding_dim, record.embedding.len())?;
        state.index_insert(record);
        Ok(())
    }

    fn get(&self, id: BehaviorId) -> Result<Option<BehaviorRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("behavior.get"))?;
        Ok(state.by_id.get(&id).cloned())
    }

    fn try_supersede(
        &self,
        old_id: BehaviorId,
        new_record: BehaviorRecord,
    ) -> Result<CasOutcome<BehaviorRecord>, StorageError> {
        if old_id == new_record.id {
            return Err(StorageError::Backend(
                "cannot supersede a behavior with itself".to_string(),
            ));
        }

        let mut state = self.state.write().map_err(|_| lock_err("behavior.try_supersede"))?;
        {
            let old = state
                .by_id
                .get(&old_id)
                .ok_or(StorageError::BehaviorNotFound(old_id))?;
            // Checked before the duplicate key so a resent supersede reports
            // the conflict, with `superseded_by` pointing at its own record.
            if old.state != BehaviorState::Active {
                return Ok(CasOutcome::Conflict { current: old.state });
            }
            if old.user_id != new_record.user_id {
                return Err(StorageError::Backend(format!(
                    "behavior {old_id} belongs to a different user"
                )));
            }
        }
        if state.by_id.contains_key(&new_record.id) {
            return Err(StorageError::DuplicateKey(new_record.id.to_string()));
        }

        // Validate everything before the first write so the pair stays atomic.
        ensure_embedding_dim(&mut state.embedding_dim, new_record.embedding.len())?;

        let new_id = new_record.id;
        if let Some(old) = state.by_id.get_mut(&old_id) {
            old.mark_superseded(new_id);
        }
        state.index_insert(new_record.clone());
        Ok(CasOutcome::Committed(new_record))
    }

    fn reinforce(
        &self,
        id: BehaviorId,
        update: Reinforcement,
    ) -> Result<CasOutcome<BehaviorRecord>, StorageError> {
        self.transition(id, "behavior.reinforce", |record| {
            record.apply_reinforcement(update.credibility, update.seen_at);
        })
    }

    fn flag(&self, id: BehaviorId) -> Result<CasOutcome<BehaviorRecord>, StorageError> {
        self.transition(id, "behavior.flag", BehaviorRecord::mark_flagged)
    }

    fn list(
        &self,
        user_id: &str,
        filter: &BehaviorFilter,
        page: PageRequest,
    ) -> Result<Page<BehaviorRecord>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("behavior.list"))?;
        let mut matching: Vec<&BehaviorRecord> = state
            .user_records(user_id)
            .filter(|r| filter.matches(r))
            .collect();

        matching.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

impl SemanticMatcher for InMemoryBehaviorStore {
    fn find_candidates(
        &self,
        user_id: &str,
        embedding: &[f32],
        distance_threshold: f32,
        max_results: usize,
    ) -> Result<Vec<SemanticMatch>, StorageError> {
        if embedding.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read().map_err(|_| lock_err("behavior.find_candidates"))?;
        if let Some(exp) = state.embedding_dim {
            if exp != embedding.len() {
                return Err(StorageError::DimensionMismatch {
                    expected: exp,
                    actual: embedding.len(),
                });
            }
        }

        let mut scored: Vec<SemanticMatch> = Vec::new();
        for record in state.user_records(user_id) {
            if !record.is_active() {
                continue;
            }
            let distance = cosine_distance(embedding, &record.embedding)?;
            if distance <= distance_threshold {
                scored.push(SemanticMatch {
                    record: record.clone(),
                    distance,
                });
            }
        }

        // Ties go to the most recently seen record, then to the lowest ID.
        scored.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| b.record.last_seen_at.cmp(&a.record.last_seen_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        scored.truncate(max_results);
        Ok(scored)
    }
}

#[derive(Debug, Default)]
struct SignalLog {
    signals: Vec<DriftSignal>,
    ids: HashMap<SignalId, usize>,
    by_behavior: HashMap<BehaviorId, Vec<usize>>,
    by_user: HashMap<String, Vec<usize>>,
}

impl SignalLog {
    fn recent<'a>(
        &'a self,
        indices: Option<&'a Vec<usize>>,
        since: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a DriftSignal> + 'a {
        indices
            .into_iter()
            .flatten()
            .filter_map(move |&i| self.signals.get(i))
            .filter(move |s| s.attempted_at >= since)
    }

    fn newest_first(mut signals: Vec<DriftSignal>, limit: usize) -> Vec<DriftSignal> {
        signals.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        signals.truncate(limit);
        signals
    }
}

/// Thread-safe in-memory drift signal log.
#[derive(Debug, Default)]
pub struct InMemorySignalStore {
    state: RwLock<SignalLog>,
}

impl InMemorySignalStore {
    /// Create a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SignalStore for InMemorySignalStore {
    fn append(&self, signal: DriftSignal) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("signal.append"))?;
        if state.ids.contains_key(&signal.id) {
            return Err(StorageError::DuplicateKey(signal.id.to_string()));
        }

        let idx = state.signals.len();
        state.ids.insert(signal.id, idx);
        state.by_behavior.entry(signal.behavior_id).or_default().push(idx);
        state.by_user.entry(signal.user_id.clone()).or_default().push(idx);
        state.signals.push(signal);
        Ok(())
    }

    fn count_recent(
        &self,
        behavior_id: BehaviorId,
        window_days: f64,
        now: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let since = window_start(now, window_days);
        let state = self.state.read().map_err(|_| lock_err("signal.count_recent"))?;
        let count = state.recent(state.by_behavior.get(&behavior_id), since).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn recent_for_behavior(
        &self,
        behavior_id: BehaviorId,
        window_days: f64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DriftSignal>, StorageError> {
        let since = window_start(now, window_days);
        let state = self.state.read().map_err(|_| lock_err("signal.recent_for_behavior"))?;
        let signals = state
            .recent(state.by_behavior.get(&behavior_id), since)
            .cloned()
            .collect();
        Ok(SignalLog::newest_first(signals, limit))
    }

    fn recent_for_user(
        &self,
        user_id: &str,
        window_days: f64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DriftSignal>, StorageError> {
        let since = window_start(now, window_days);
        let state = self.state.read().map_err(|_| lock_err("signal.recent_for_user"))?;
        let signals = state.recent(state.by_user.get(user_id), since).cloned().collect();
        Ok(SignalLog::newest_first(signals, limit))
    }
}

/// Convenience bundle of in-memory stores sharing one ledger.
#[derive(Debug, Clone)]
pub struct InMemoryStores {
    pub behaviors: Arc<InMemoryBehaviorStore>,
    pub signals: Arc<InMemorySignalStore>,
}

impl InMemoryStores {
    /// Stores with a fixed embedding dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            behaviors: Arc::new(InMemoryBehaviorStore::with_dimension(dimension)),
            signals: Arc::new(InMemorySignalStore::new()),
        }
    }
}

impl Default for InMemoryStores {
    fn default() -> Self {
        Self {
            behaviors: Arc::new(InMemoryBehaviorStore::new()),
            signals: Arc::new(InMemorySignalStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Polarity;
    use crate::candidate::Candidate;
    use crate::credibility::Credibility;
    use crate::signal::DriftType;
    use chrono::Duration;

    fn record(user: &str, target: &str, embedding: Vec<f32>, at: DateTime<Utc>) -> BehaviorRecord {
        let dim = embedding.len();
        let candidate = Candidate {
            intent: "PREFERENCE".to_string(),
            target: target.to_string(),
            context: "general".to_string(),
            polarity: Polarity::Positive,
            credibility: 0.8,
            embedding,
            observed_at: Some(at),
        }
        .validate(dim, at)
        .unwrap();
        BehaviorRecord::from_candidate(user, &candidate)
    }

    #[test]
    fn cosine_distance_basics() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).unwrap().abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() - 2.0).abs() < 1e-6);
        assert!((cosine_distance(&[0.0, 0.0], &[1.0, 0.0]).unwrap() - 2.0).abs() < 1e-6);
        assert!(cosine_distance(&[1.0], &[1.0, 0.0]).is_err());
    }

    #[test]
    fn insert_rejects_duplicate_and_wrong_dimension() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let r = record("u1", "Rust", vec![1.0, 0.0], Utc::now());
        store.insert(r.clone()).unwrap();
        assert!(matches!(store.insert(r), Err(StorageError::DuplicateKey(_))));

        let bad = record("u1", "Go", vec![1.0, 0.0, 0.0], Utc::now());
        assert!(matches!(
            store.insert(bad),
            Err(StorageError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn find_candidates_filters_user_state_and_gate() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let now = Utc::now();
        let near = record("u1", "Rust", vec![1.0, 0.1], now);
        let far = record("u1", "Cooking", vec![0.0, 1.0], now);
        let other_user = record("u2", "Rust", vec![1.0, 0.0], now);
        let near_id = near.id;
        store.insert(near).unwrap();
        store.insert(far).unwrap();
        store.insert(other_user).unwrap();

        let matches = store.find_candidates("u1", &[1.0, 0.0], 0.5, 5).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].record.id, near_id);

        store.flag(near_id).unwrap();
        assert!(store.find_candidates("u1", &[1.0, 0.0], 0.5, 5).unwrap().is_empty());
    }

    #[test]
    fn find_candidates_orders_by_distance_and_caps() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let now = Utc::now();
        let a = record("u1", "a", vec![1.0, 0.3], now);
        let b = record("u1", "b", vec![1.0, 0.0], now);
        let c = record("u1", "c", vec![1.0, 0.6], now);
        let b_id = b.id;
        let a_id = a.id;
        for r in [a, b, c] {
            store.insert(r).unwrap();
        }
        let matches = store.find_candidates("u1", &[1.0, 0.0], 1.0, 2).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].record.id, b_id);
        assert_eq!(matches[1].record.id, a_id);
        assert!(matches[0].distance <= matches[1].distance);
    }

    #[test]
    fn try_supersede_is_guarded() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let now = Utc::now();
        let old = record("u1", "Python", vec![1.0, 0.0], now);
        let old_id = old.id;
        store.insert(old).unwrap();

        let first = record("u1", "Go", vec![1.0, 0.1], now);
        let first_id = first.id;
        let outcome = store.try_supersede(old_id, first).unwrap();
        assert!(outcome.is_committed());

        let old_after = store.get(old_id).unwrap().unwrap();
        assert_eq!(old_after.state, BehaviorState::Superseded);
        assert_eq!(old_after.superseded_by, Some(first_id));

        let second = record("u1", "Zig", vec![1.0, 0.2], now);
        let second_id = second.id;
        let outcome = store.try_supersede(old_id, second).unwrap();
        assert_eq!(
            outcome,
            CasOutcome::Conflict {
                current: BehaviorState::Superseded
            }
        );
        assert!(store.get(second_id).unwrap().is_none());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn resent_supersede_reports_conflict_not_duplicate() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let now = Utc::now();
        let old = record("u1", "Python", vec![1.0, 0.0], now);
        let old_id = old.id;
        store.insert(old).unwrap();

        let replacement = record("u1", "Go", vec![1.0, 0.1], now);
        assert!(store.try_supersede(old_id, replacement.clone()).unwrap().is_committed());
        let resent = store.try_supersede(old_id, replacement.clone()).unwrap();
        assert_eq!(
            resent,
            CasOutcome::Conflict {
                current: BehaviorState::Superseded
            }
        );
        assert_eq!(store.get(old_id).unwrap().unwrap().superseded_by, Some(replacement.id));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn try_supersede_missing_or_cross_user() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let now = Utc::now();
        let missing =
            store.try_supersede(BehaviorId::new(), record("u1", "x", vec![1.0, 0.0], now));
        assert!(matches!(missing, Err(StorageError::BehaviorNotFound(_))));

        let old = record("u1", "Python", vec![1.0, 0.0], now);
        let old_id = old.id;
        store.insert(old).unwrap();
        let cross = store.try_supersede(old_id, record("u2", "Go", vec![1.0, 0.0], now));
        assert!(matches!(cross, Err(StorageError::Backend(_))));
        assert!(store.get(old_id).unwrap().unwrap().is_active());
    }

    #[test]
    fn reinforce_applies_max_and_is_guarded() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let now = Utc::now();
        let r = record("u1", "Rust", vec![1.0, 0.0], now);
        let id = r.id;
        store.insert(r).unwrap();

        let later = now + Duration::days(1);
        let CasOutcome::Committed(updated) = store
            .reinforce(
                id,
                Reinforcement {
                    credibility: Credibility::new(0.2).unwrap(),
                    seen_at: later,
                },
            )
            .unwrap()
        else {
            panic!("expected commit");
        };
        assert_eq!(updated.reinforcement_count, 2);
        assert!((updated.credibility.value() - 0.8).abs() < f64::EPSILON);
        assert_eq!(updated.last_seen_at, later);

        store.flag(id).unwrap();
        let outcome = store
            .reinforce(
                id,
                Reinforcement {
                    credibility: Credibility::one(),
                    seen_at: later,
                },
            )
            .unwrap();
        assert_eq!(
            outcome,
            CasOutcome::Conflict {
                current: BehaviorState::Flagged
            }
        );
    }

    #[test]
    fn list_paginates_and_filters() {
        let store = InMemoryBehaviorStore::with_dimension(2);
        let base = Utc::now();
        let mut ids = Vec::new();
        for i in 0..5 {
            let r = record("u1", &format!("t{i}"), vec![1.0, 0.0], base + Duration::minutes(i));
            ids.push(r.id);
            store.insert(r).unwrap();
        }
        store.flag(ids[0]).unwrap();

        let page = store
            .list("u1", &BehaviorFilter::active(), PageRequest::new(0, 2).unwrap())
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, ids[4]);
        assert!(page.has_more());

        let last = store
            .list("u1", &BehaviorFilter::active(), PageRequest::new(0, 2).unwrap().next().next())
            .unwrap();
        assert!(last.items.is_empty());
        assert!(!last.has_more());

        let flagged = BehaviorFilter {
            state: Some(BehaviorState::Flagged),
            intent: None,
        };
        let page = store.list("u1", &flagged, PageRequest::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, ids[0]);

        let empty = store
            .list("nobody", &BehaviorFilter::default(), PageRequest::default())
            .unwrap();
        assert_eq!(empty.total, 0);
    }

    #[test]
    fn signal_counts_respect_window_and_read_after_write() {
        let signals = InMemorySignalStore::new();
        let now = Utc::now();
        let behavior = record("u1", "Python", vec![1.0, 0.0], now);
        let candidate = Candidate {
            intent: "PREFERENCE".to_string(),
            target: "Go".to_string(),
            context: "general".to_string(),
            polarity: Polarity::Positive,
            credibility: 0.1,
            embedding: vec![1.0, 0.0],
            observed_at: None,
        };

        for days_ago in [40, 20, 1] {
            let at = now - Duration::days(days_ago);
            let valid = candidate.validate(2, at).unwrap();
            signals
                .append(DriftSignal::rejected("u1", behavior.id, &valid, DriftType::TargetShift))
                .unwrap();
        }

        assert_eq!(signals.count_recent(behavior.id, 30.0, now).unwrap(), 2);
        assert_eq!(signals.count_recent(behavior.id, 60.0, now).unwrap(), 3);
        assert_eq!(signals.count_recent(BehaviorId::new(), 60.0, now).unwrap(), 0);

        let recent = signals.recent_for_behavior(behavior.id, 60.0, now, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].attempted_at > recent[1].attempted_at);

        let by_user = signals.recent_for_user("u1", 30.0, now, 10).unwrap();
        assert_eq!(by_user.len(), 2);
        assert!(signals.recent_for_user("u2", 30.0, now, 10).unwrap().is_empty());
    }
}
