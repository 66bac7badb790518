use std::time::Duration;

use chrono::Utc;

use kyrodrift::{
    lane_for, ActionType, BatchRequest, BehaviorFilter, Candidate, DriftRuntime, PageRequest,
    Polarity, ResolutionConfig, ResolutionEngine, RuntimeConfig,
};

fn candidate(target: &str) -> Candidate {
    Candidate {
        intent: "PREFERENCE".to_string(),
        target: target.to_string(),
        context: "general".to_string(),
        polarity: Polarity::Positive,
        credibility: 0.6,
        embedding: vec![0.0, 1.0],
        observed_at: None,
    }
}

fn runtime(lanes: usize) -> DriftRuntime {
    let config = ResolutionConfig {
        embedding_dimension: 2,
        ..ResolutionConfig::default()
    };
    let (engine, _stores) = ResolutionEngine::in_memory(config).unwrap();
    DriftRuntime::new(
        engine,
        &RuntimeConfig {
            lanes,
            queue_capacity: 64,
        },
    )
    .unwrap()
}

#[test]
fn same_user_batches_are_applied_in_submission_order() {
    let rt = runtime(4);
    let t0 = Utc::now();
    let users = ["alice", "bob", "carol"];

    let mut handles = Vec::new();
    for round in 0..5 {
        for user in users {
            let request = BatchRequest::new(user, vec![candidate("Rust")]).at(t0);
            let handle = rt.submit(request).unwrap();
            assert_eq!(handle.lane(), lane_for(user, rt.lane_count()));
            handles.push((round, user, handle));
        }
    }

    for (round, user, handle) in handles {
        let response = handle.join_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(response.user_id, user);
        let action = &response.actions[0];
        if round == 0 {
            assert_eq!(action.action_type(), ActionType::Insert);
        } else {
            assert_eq!(action.action_type(), ActionType::Reinforce);
            assert_eq!(action.reason, format!("Behavior reinforced (occurrence #{})", round + 1));
        }
    }

    for user in users {
        let page = rt
            .engine()
            .list_behaviors(user, &BehaviorFilter::active(), PageRequest::default())
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].reinforcement_count, 5);
    }
}

#[test]
fn process_waits_for_the_response() {
    let rt = runtime(2);
    let response = rt
        .process(BatchRequest::new("dave", vec![candidate("Go"), candidate("Go")]))
        .unwrap();
    assert_eq!(response.processed_count, 2);
    assert_eq!(response.actions[0].action_type(), ActionType::Insert);
    assert_eq!(response.actions[1].action_type(), ActionType::Reinforce);
}

#[test]
fn dropping_the_runtime_drains_queued_batches() {
    let rt = runtime(1);
    let handles: Vec<_> = (0..10)
        .map(|i| {
            rt.submit(BatchRequest::new(format!("user-{i}"), vec![candidate("Rust")]))
                .unwrap()
        })
        .collect();
    drop(rt);

    for handle in handles {
        let response = handle.join().unwrap();
        assert_eq!(response.actions[0].action_type(), ActionType::Insert);
    }
}
