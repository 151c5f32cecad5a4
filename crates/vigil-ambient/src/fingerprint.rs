//! The context fingerprint and its weighted similarity.
//!
//! Two consecutive ticks with near-identical fingerprints mean the user's
//! world has not changed; the orchestrator then skips engagement unless
//! something demands attention anyway.

use std::collections::BTreeSet;

use serde::Serialize;

const W_ACTIVITY: f64 = 0.5;
const W_ENTITIES: f64 = 0.3;
const W_TASKS: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ContextFingerprint {
    /// The `(app, title)` streak key, when a desktop monitor is present.
    pub activity_key: Option<String>,
    pub entities: BTreeSet<String>,
    pub task_ids: BTreeSet<String>,
}

impl ContextFingerprint {
    pub fn new(
        activity_key: Option<String>,
        entities: impl IntoIterator<Item = String>,
        task_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            activity_key,
            entities: entities.into_iter().collect(),
            task_ids: task_ids.into_iter().collect(),
        }
    }
}

/// Weighted similarity in [0, 1]:
/// 0.5·activity match + 0.3·jaccard(entities) + 0.2·jaccard(tasks).
pub fn similarity(a: &ContextFingerprint, b: &ContextFingerprint) -> f64 {
    let activity = if a.activity_key == b.activity_key {
        1.0
    } else {
        0.0
    };
    W_ACTIVITY * activity
        + W_ENTITIES * jaccard(&a.entities, &b.entities)
        + W_TASKS * jaccard(&a.task_ids, &b.task_ids)
}

/// Jaccard index; two empty sets count as identical.
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(activity: Option<&str>, entities: &[&str], tasks: &[&str]) -> ContextFingerprint {
        ContextFingerprint::new(
            activity.map(String::from),
            entities.iter().map(|s| s.to_string()),
            tasks.iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn identical_fingerprints_score_one() {
        let a = fp(Some("code::main.rs"), &["rust", "sqlite"], &["7"]);
        assert!((similarity(&a, &a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_fingerprints_are_identical() {
        assert!((similarity(&fp(None, &[], &[]), &fp(None, &[], &[])) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn activity_change_costs_half() {
        let a = fp(Some("code::main.rs"), &["rust"], &[]);
        let b = fp(Some("browser::news"), &["rust"], &[]);
        assert!((similarity(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn disjoint_everything_scores_zero_entities_and_tasks() {
        let a = fp(Some("x"), &["rust"], &["1"]);
        let b = fp(Some("y"), &["go"], &["2"]);
        assert!(similarity(&a, &b) < 1e-9);
    }

    #[test]
    fn partial_entity_overlap_is_weighted() {
        let a = fp(Some("k"), &["rust", "sqlite"], &[]);
        let b = fp(Some("k"), &["rust", "tokio"], &[]);
        // 0.5 + 0.3 * (1/3) + 0.2 * 1.0
        let expected = 0.5 + 0.3 / 3.0 + 0.2;
        assert!((similarity(&a, &b) - expected).abs() < 1e-9);
    }
}
