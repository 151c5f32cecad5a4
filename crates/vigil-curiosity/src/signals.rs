//! Signal detectors: small deterministic functions over one conversation
//! turn plus its immediate neighbours.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use vigil_store::types::Role;

use crate::emotion;

/// Emotional intensity at or above this is a peak.
pub const EMOTIONAL_PEAK_THRESHOLD: f64 = 0.7;
/// Longest topic phrase stored on a task title.
const MAX_TOPIC_CHARS: usize = 80;
/// At most this many entity candidates are checked per turn.
pub const MAX_ENTITY_CANDIDATES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Correction,
    EmotionalPeak,
    KnowledgeGap,
    UnfinishedThread,
    UnfamiliarEntity,
    ResearchChain,
}

impl SignalType {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalType::Correction => "correction",
            SignalType::EmotionalPeak => "emotional_peak",
            SignalType::KnowledgeGap => "knowledge_gap",
            SignalType::UnfinishedThread => "unfinished_thread",
            SignalType::UnfamiliarEntity => "unfamiliar_entity",
            SignalType::ResearchChain => "research_chain",
        }
    }

    /// Re-trigger window; corrections go stale faster.
    pub fn ttl_days(self) -> i64 {
        match self {
            SignalType::Correction => 7,
            _ => 14,
        }
    }
}

/// One structured observation worth exploring.
#[derive(Debug, Clone)]
pub struct CuriositySignal {
    pub signal_type: SignalType,
    /// Concept phrase; doubles as the upsert key (lowercased).
    pub topic: String,
    pub user_interest: f64,
    pub knowledge_gap: f64,
    pub context: String,
}

/// The slice of conversation state the detectors see.
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub session_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub role: Option<Role>,
    pub text: String,
    /// The assistant turn immediately before this one, if any.
    pub previous_assistant_text: Option<String>,
    /// The user turn immediately before this one, if any.
    pub previous_user_text: Option<String>,
    /// Command inputs never generate curiosity.
    pub is_command: bool,
}

fn correction_patterns() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(actually|that's (not|wrong)|that is (not|wrong)|no[,.]\s|i meant|not quite|incorrect|you're wrong|it's actually)\b",
        )
        .expect("correction regex is valid")
    })
}

fn hedging_patterns() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(i'?m not sure|i don'?t know|i might be (wrong|mistaken)|i'?m uncertain|not familiar with|can'?t say for certain|i believe|possibly|hard to say)\b",
        )
        .expect("hedging regex is valid")
    })
}

/// Correction: a user turn that follows an assistant turn and matches the
/// correction vocabulary.
pub fn detect_correction(turn: &TurnContext) -> Option<CuriositySignal> {
    if turn.role != Some(Role::User) || turn.previous_assistant_text.is_none() {
        return None;
    }
    if !correction_patterns().is_match(&turn.text) {
        return None;
    }
    Some(CuriositySignal {
        signal_type: SignalType::Correction,
        topic: truncate_topic(&turn.text),
        user_interest: 0.7,
        knowledge_gap: 0.0,
        context: turn.text.clone(),
    })
}

/// Emotional peak: a user turn whose scored intensity crosses the threshold.
pub fn detect_emotional_peak(turn: &TurnContext) -> Option<CuriositySignal> {
    if turn.role != Some(Role::User) {
        return None;
    }
    let intensity = emotion::intensity(&turn.text);
    if intensity < EMOTIONAL_PEAK_THRESHOLD {
        return None;
    }
    Some(CuriositySignal {
        signal_type: SignalType::EmotionalPeak,
        topic: truncate_topic(&turn.text),
        user_interest: (intensity + 0.1).min(1.0),
        knowledge_gap: 0.0,
        context: turn.text.clone(),
    })
}

/// Knowledge gap: an assistant turn that hedges, in reply to a user turn.
/// The topic is the user's question — that is what deserves exploration.
pub fn detect_knowledge_gap(turn: &TurnContext) -> Option<CuriositySignal> {
    if turn.role != Some(Role::Assistant) {
        return None;
    }
    let question = turn.previous_user_text.as_deref()?;
    if !hedging_patterns().is_match(&turn.text) {
        return None;
    }
    Some(CuriositySignal {
        signal_type: SignalType::KnowledgeGap,
        topic: truncate_topic(question),
        user_interest: 0.4,
        knowledge_gap: 0.8,
        context: turn.text.clone(),
    })
}

/// Build an unfamiliar-entity signal once the graph lookup came back empty.
pub fn unfamiliar_entity_signal(entity: &str, turn: &TurnContext) -> CuriositySignal {
    CuriositySignal {
        signal_type: SignalType::UnfamiliarEntity,
        topic: entity.to_string(),
        user_interest: 0.4,
        knowledge_gap: 0.0,
        context: turn.text.clone(),
    }
}

/// Candidate entity names: runs of capitalized words that are not sentence
/// starts, plus known stopword filtering. Deliberately conservative — the
/// graph lookup is the real filter.
pub fn candidate_entities(text: &str) -> Vec<String> {
    const STOPWORDS: &[&str] = &[
        "I", "The", "A", "An", "This", "That", "It", "We", "You", "They",
        "My", "He", "She", "What", "Why", "How", "When", "Where", "Who",
        "OK", "Yes", "No",
    ];

    let mut out: Vec<String> = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    let mut sentence_start = true;

    for raw in text.split_whitespace() {
        let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
        let is_cap = word
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
            && word.len() >= 2;

        if is_cap && !(sentence_start && run.is_empty()) && !STOPWORDS.contains(&word) {
            run.push(word);
        } else {
            flush_run(&mut run, &mut out);
        }
        sentence_start = raw.ends_with(['.', '!', '?']);
    }
    flush_run(&mut run, &mut out);

    out.dedup();
    out.truncate(MAX_ENTITY_CANDIDATES);
    out
}

fn flush_run(run: &mut Vec<&str>, out: &mut Vec<String>) {
    if !run.is_empty() {
        out.push(run.join(" "));
        run.clear();
    }
}

fn truncate_topic(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX_TOPIC_CHARS {
        return trimmed.to_string();
    }
    trimmed.chars().take(MAX_TOPIC_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_turn(text: &str) -> TurnContext {
        TurnContext {
            role: Some(Role::User),
            text: text.to_string(),
            previous_assistant_text: Some("it uses mysql under the hood".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn correction_needs_a_preceding_assistant_turn() {
        let signal = detect_correction(&user_turn("no, it's actually postgres"));
        assert_eq!(signal.unwrap().signal_type, SignalType::Correction);

        let mut orphan = user_turn("no, it's actually postgres");
        orphan.previous_assistant_text = None;
        assert!(detect_correction(&orphan).is_none());
    }

    #[test]
    fn correction_ignores_assistant_turns() {
        let mut turn = user_turn("actually, let me reconsider");
        turn.role = Some(Role::Assistant);
        assert!(detect_correction(&turn).is_none());
    }

    #[test]
    fn emotional_peak_interest_tracks_intensity() {
        let signal = detect_emotional_peak(&user_turn("this is AMAZING, I love it!!!"))
            .expect("peak detected");
        assert!(signal.user_interest > 0.7);
        assert!(signal.user_interest <= 1.0);
        assert!(detect_emotional_peak(&user_turn("fine, thanks")).is_none());
    }

    #[test]
    fn knowledge_gap_topic_is_the_user_question() {
        let turn = TurnContext {
            role: Some(Role::Assistant),
            text: "I'm not sure how epoll handles that edge".to_string(),
            previous_user_text: Some("how does epoll handle level triggering?".to_string()),
            ..Default::default()
        };
        let signal = detect_knowledge_gap(&turn).expect("gap detected");
        assert_eq!(signal.topic, "how does epoll handle level triggering?");
        assert_eq!(signal.knowledge_gap, 0.8);

        let no_question = TurnContext {
            role: Some(Role::Assistant),
            text: "I'm not sure".to_string(),
            ..Default::default()
        };
        assert!(detect_knowledge_gap(&no_question).is_none());
    }

    #[test]
    fn entity_candidates_skip_sentence_starts_and_stopwords() {
        let ents = candidate_entities("Yesterday I deployed Kubernetes on Hetzner Cloud.");
        assert!(ents.contains(&"Kubernetes".to_string()));
        assert!(ents.contains(&"Hetzner Cloud".to_string()));
        assert!(!ents.iter().any(|e| e == "Yesterday"));
    }
}
