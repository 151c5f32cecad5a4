//! End-to-end invariant checks against a real (in-memory) database:
//! backlog pressure, claim contention across threads, core-memory version
//! monotonicity, and context-cache freshness.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use serde_json::json;

use vigil_store::memory::BlockScope;
use vigil_store::queue::QueueStats;
use vigil_store::tasks::{BacklogLimits, CuriosityUpsert};
use vigil_store::types::TaskStatus;
use vigil_store::Store;

fn limits() -> BacklogLimits {
    BacklogLimits {
        max_pending_per_user: 100,
        max_pending_per_type: 25,
    }
}

#[test]
fn backlog_pressure_caps_at_one_hundred_pending() {
    let store = Store::open_in_memory().unwrap();
    // 150 distinct topics spread over six detector categories so the
    // per-type bound (25 each) admits them all; the per-user bound then
    // cancels the 50 lowest-priority tasks.
    let types = [
        "correction",
        "emotional_peak",
        "knowledge_gap",
        "unfinished_thread",
        "unfamiliar_entity",
        "research_chain",
    ];
    for i in 0..150u32 {
        let score = 0.16 + f64::from(i) * 0.005;
        let upsert = CuriosityUpsert {
            title: format!("topic {i}"),
            description: format!("explore topic {i}"),
            curiosity_type: types[(i % 6) as usize].to_string(),
            score: score.min(1.0),
            priority_factors: json!({"user_interest": score}),
            ttl_days: 14,
        };
        store
            .process_curiosity_batch("alice", &[upsert], limits())
            .unwrap();
    }

    let pending = store.pending_curiosity_tasks("alice").unwrap();
    assert_eq!(pending.len(), 100);
    assert!(pending.iter().all(|t| t.task_type == "curiosity"));
    assert!(pending.iter().all(|t| t.status.is_pending()));

    // The cancelled tail is exactly the lowest-priority half, annotated.
    let min_kept = pending.iter().map(|t| t.priority).min().unwrap();
    let mut cancelled = 0;
    for i in 0..150u32 {
        // Find each original topic; pending list misses the pruned ones.
        if !pending.iter().any(|t| t.title == format!("topic {i}")) {
            cancelled += 1;
            let score = 0.16 + f64::from(i) * 0.005;
            let priority = (score.min(1.0) * 100.0).floor() as i64;
            assert!(priority <= min_kept, "a higher-priority task was pruned");
        }
    }
    assert_eq!(cancelled, 50);
}

#[test]
fn pruned_tasks_carry_reason_annotations() {
    let store = Store::open_in_memory().unwrap();
    let batch: Vec<CuriosityUpsert> = (0..30)
        .map(|i| CuriosityUpsert {
            title: format!("entity {i}"),
            description: String::new(),
            curiosity_type: "unfamiliar_entity".to_string(),
            score: 0.3 + f64::from(i) * 0.01,
            priority_factors: json!({}),
            ttl_days: 14,
        })
        .collect();
    store
        .process_curiosity_batch("alice", &batch, limits())
        .unwrap();
    assert_eq!(store.pending_curiosity_count("alice").unwrap(), 25);

    // The five cancelled rows carry last_error and pruned_reason.
    for i in 0..5 {
        let pending = store.pending_curiosity_tasks("alice").unwrap();
        assert!(
            !pending.iter().any(|t| t.title == format!("entity {i}")),
            "lowest-priority entity {i} should have been pruned"
        );
    }
}

#[test]
fn claim_under_contention_is_exclusive() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let priorities = [10, 10, 10, 5, 5, 5, 1, 1, 1, 1];
    let mut low_ids = HashSet::new();
    for p in priorities {
        let id = store
            .enqueue("mission", "X", "work", &json!({}), p, None)
            .unwrap();
        if p == 1 {
            low_ids.insert(id);
        }
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            store.claim("X").unwrap().map(|t| t.id)
        }));
    }
    let claimed: Vec<i64> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("each worker claims one"))
        .collect();

    let distinct: HashSet<i64> = claimed.iter().copied().collect();
    assert_eq!(distinct.len(), 4, "no row may be claimed twice");
    assert_eq!(distinct, low_ids, "the four priority-1 rows win");

    let stats: QueueStats = store.queue_stats().unwrap();
    assert_eq!(stats.processing, 4);
    assert_eq!(stats.pending, 6);
}

#[test]
fn core_memory_versions_stay_dense_under_interleaving() {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let mut handles = Vec::new();
    for worker in 0..4 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            let scope = BlockScope::User("alice".to_string());
            for i in 0..5 {
                store
                    .edit_core_memory(&scope, "task", &format!("w{worker} i{i}"), None, None)
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let scope = BlockScope::User("alice".to_string());
    let block = store.get_core_memory(&scope, "task").unwrap().unwrap();
    assert_eq!(block.version, 20);
    let history = store.core_memory_history(&scope, "task", 100).unwrap();
    let mut versions: Vec<i64> = history.iter().map(|v| v.version).collect();
    versions.sort_unstable();
    assert_eq!(versions, (1..=20).collect::<Vec<i64>>());
}

#[test]
fn retriggered_task_is_never_deprioritized() {
    let store = Store::open_in_memory().unwrap();
    let mk = |score: f64| CuriosityUpsert {
        title: "it's actually postgres".to_string(),
        description: String::new(),
        curiosity_type: "correction".to_string(),
        score,
        priority_factors: json!({"type_weight": 0.9}),
        ttl_days: 7,
    };
    store
        .process_curiosity_batch("alice", &[mk(0.8)], limits())
        .unwrap();
    // A weaker later signal must not lower the stored priority.
    store
        .process_curiosity_batch("alice", &[mk(0.2)], limits())
        .unwrap();
    let task = &store.pending_curiosity_tasks("alice").unwrap()[0];
    assert!(task.priority >= 80);
    assert_eq!(task.status, TaskStatus::Ready);
}
