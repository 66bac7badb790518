use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Utc;

use kyrodrift::{
    ActionType, BatchRequest, BehaviorFilter, BehaviorRecord, BehaviorState, BehaviorStore,
    Candidate, CasOutcome, InMemoryBehaviorStore, PageRequest, Polarity, ResolutionConfig,
    ResolutionEngine, RetryConfig,
};

fn candidate(target: &str, credibility: f64, embedding: Vec<f32>) -> Candidate {
    Candidate {
        intent: "PREFERENCE".to_string(),
        target: target.to_string(),
        context: "backend".to_string(),
        polarity: Polarity::Positive,
        credibility,
        embedding,
        observed_at: None,
    }
}

fn record(user: &str, target: &str) -> BehaviorRecord {
    let valid = candidate(target, 0.5, vec![1.0, 0.0, 0.0])
        .validate(3, Utc::now())
        .unwrap();
    BehaviorRecord::from_candidate(user, &valid)
}

#[test]
fn racing_supersedes_commit_exactly_once() {
    const WRITERS: usize = 8;

    let store = Arc::new(InMemoryBehaviorStore::with_dimension(3));
    let original = record("alice", "Python");
    let original_id = original.id;
    store.insert(original).unwrap();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let replacement = record("alice", &format!("lang-{i}"));
                barrier.wait();
                store.try_supersede(original_id, replacement).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<CasOutcome<BehaviorRecord>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let committed: Vec<&BehaviorRecord> = outcomes
        .iter()
        .filter_map(|o| match o {
            CasOutcome::Committed(r) => Some(r),
            CasOutcome::Conflict { .. } => None,
        })
        .collect();
    assert_eq!(committed.len(), 1);
    for outcome in &outcomes {
        if let CasOutcome::Conflict { current } = outcome {
            assert_eq!(*current, BehaviorState::Superseded);
        }
    }

    let old = store.get(original_id).unwrap().unwrap();
    assert_eq!(old.superseded_by, Some(committed[0].id));

    let active = store
        .list("alice", &BehaviorFilter::active(), PageRequest::default())
        .unwrap();
    assert_eq!(active.total, 1);
    assert_eq!(active.items[0].id, committed[0].id);
    assert_eq!(store.len().unwrap(), 2);
}

#[test]
fn concurrent_batches_leave_one_active_record_per_cluster() {
    let config = ResolutionConfig {
        embedding_dimension: 3,
        retry: RetryConfig::immediate(3),
        ..ResolutionConfig::default()
    };
    let (engine, stores) = ResolutionEngine::in_memory(config).unwrap();
    let engine = Arc::new(engine);

    let seeded = engine.process_batch(&BatchRequest::new(
        "alice",
        vec![candidate("Python", 0.3, vec![1.0, 0.0, 0.0])],
    ));
    let original_id = seeded.actions[0].new_behavior_id().unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [("Go", 0.8f64), ("Zig", 0.9f64)]
        .into_iter()
        .map(|(target, credibility)| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let request = BatchRequest::new(
                    "alice",
                    vec![candidate(target, credibility, vec![1.0, 0.05, 0.0])],
                );
                barrier.wait();
                engine.process_batch(&request)
            })
        })
        .collect();

    let actions: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().actions.into_iter().next().unwrap())
        .collect();

    // Neither writer may fail or replace the original twice.
    assert!(actions.iter().all(|a| !a.is_error()));
    let replaced_original = actions
        .iter()
        .filter(|a| {
            a.action_type() == ActionType::Supersede && a.old_behavior_id() == Some(original_id)
        })
        .count();
    assert_eq!(replaced_original, 1);

    let active = stores
        .behaviors
        .list("alice", &BehaviorFilter::active(), PageRequest::default())
        .unwrap();
    assert_eq!(active.total, 1);

    let superseded: HashSet<_> = stores
        .behaviors
        .snapshot("alice")
        .unwrap()
        .into_iter()
        .filter(|r| r.state == BehaviorState::Superseded)
        .map(|r| r.id)
        .collect();
    assert!(superseded.contains(&original_id));
}

#[test]
fn reinforce_after_supersede_is_rejected() {
    let store = InMemoryBehaviorStore::with_dimension(3);
    let original = record("alice", "Python");
    let original_id = original.id;
    store.insert(original).unwrap();
    store
        .try_supersede(original_id, record("alice", "Go"))
        .unwrap();

    let outcome = store
        .reinforce(
            original_id,
            kyrodrift::Reinforcement {
                credibility: kyrodrift::Credibility::one(),
                seen_at: Utc::now(),
            },
        )
        .unwrap();
    assert!(!outcome.is_committed());

    let old = store.get(original_id).unwrap().unwrap();
    assert_eq!(old.reinforcement_count, 1);
}
