//! The curiosity priority function.
//!
//! score = 0.30·user_interest + 0.25·knowledge_gap + 0.20·type_weight
//!       + 0.15·recency + 0.10·exploration_boost, every term clamped to
//! [0, 1]. The store layer converts scores to integer priorities and adds
//! the repeat bonus on re-trigger.

use serde_json::{json, Value};

use crate::signals::{CuriositySignal, SignalType};

const W_INTEREST: f64 = 0.30;
const W_GAP: f64 = 0.25;
const W_TYPE: f64 = 0.20;
const W_RECENCY: f64 = 0.15;
const W_BOOST: f64 = 0.10;

/// Relative weight of each signal family.
pub fn type_weight(signal_type: SignalType) -> f64 {
    match signal_type {
        SignalType::Correction => 0.9,
        SignalType::EmotionalPeak => 0.7,
        SignalType::KnowledgeGap => 0.6,
        SignalType::UnfinishedThread => 0.6,
        SignalType::UnfamiliarEntity => 0.5,
        SignalType::ResearchChain => 0.4,
    }
}

/// Diminishing returns per past exploration of the same topic.
pub fn exploration_boost(exploration_count: i64) -> f64 {
    (1.0 - 0.1 * exploration_count as f64).max(0.0)
}

/// Linear decay over the signal-type ttl.
pub fn recency(age_days: f64, ttl_days: i64) -> f64 {
    (1.0 - age_days / ttl_days as f64).max(0.0)
}

/// The combined score in [0, 1].
pub fn score(signal: &CuriositySignal, exploration_count: i64, age_days: f64) -> f64 {
    let ttl = signal.signal_type.ttl_days();
    let value = W_INTEREST * clamp01(signal.user_interest)
        + W_GAP * clamp01(signal.knowledge_gap)
        + W_TYPE * clamp01(type_weight(signal.signal_type))
        + W_RECENCY * clamp01(recency(age_days, ttl))
        + W_BOOST * clamp01(exploration_boost(exploration_count));
    clamp01(value)
}

/// The factor breakdown stored under `extra.priority_factors`.
pub fn factors(signal: &CuriositySignal, exploration_count: i64, age_days: f64) -> Value {
    let ttl = signal.signal_type.ttl_days();
    json!({
        "user_interest": signal.user_interest,
        "knowledge_gap": signal.knowledge_gap,
        "type_weight": type_weight(signal.signal_type),
        "recency": recency(age_days, ttl),
        "exploration_boost": exploration_boost(exploration_count),
        "score": score(signal, exploration_count, age_days),
    })
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(signal_type: SignalType, interest: f64, gap: f64) -> CuriositySignal {
        CuriositySignal {
            signal_type,
            topic: "t".to_string(),
            user_interest: interest,
            knowledge_gap: gap,
            context: String::new(),
        }
    }

    #[test]
    fn fresh_correction_scores_highest() {
        let correction = score(&signal(SignalType::Correction, 0.7, 0.0), 0, 0.0);
        let entity = score(&signal(SignalType::UnfamiliarEntity, 0.4, 0.0), 0, 0.0);
        assert!(correction > entity);
        // 0.30*0.7 + 0.20*0.9 + 0.15*1.0 + 0.10*1.0 = 0.64
        assert!((correction - 0.64).abs() < 1e-9);
    }

    #[test]
    fn knowledge_gap_term_contributes() {
        let gap = score(&signal(SignalType::KnowledgeGap, 0.4, 0.8), 0, 0.0);
        // 0.30*0.4 + 0.25*0.8 + 0.20*0.6 + 0.15 + 0.10 = 0.69
        assert!((gap - 0.69).abs() < 1e-9);
    }

    #[test]
    fn recency_decays_to_zero_at_ttl() {
        assert!((recency(0.0, 14) - 1.0).abs() < 1e-9);
        assert!((recency(7.0, 14) - 0.5).abs() < 1e-9);
        assert_eq!(recency(14.0, 14), 0.0);
        assert_eq!(recency(30.0, 14), 0.0);
    }

    #[test]
    fn exploration_boost_floors_at_zero() {
        assert!((exploration_boost(0) - 1.0).abs() < 1e-9);
        assert!((exploration_boost(3) - 0.7).abs() < 1e-9);
        assert_eq!(exploration_boost(15), 0.0);
    }

    #[test]
    fn score_never_leaves_unit_interval() {
        let s = score(&signal(SignalType::Correction, 5.0, 5.0), 0, 0.0);
        assert!(s <= 1.0);
        let s = score(&signal(SignalType::ResearchChain, 0.0, 0.0), 100, 100.0);
        assert!(s >= 0.0);
    }
}
