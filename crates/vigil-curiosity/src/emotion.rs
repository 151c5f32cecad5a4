//! Emotional-intensity heuristic over a single turn.
//!
//! Deterministic scoring from three cheap signals: charged vocabulary,
//! exclamation density, and shouting (fully uppercase words). No model
//! call — this runs on every ingested message.

/// Strongly charged words. Matching is case-insensitive on word boundaries.
const LEXICON: &[&str] = &[
    "amazing", "awesome", "fantastic", "incredible", "love", "best",
    "thrilled", "excited", "perfect", "brilliant",
    "terrible", "awful", "horrible", "hate", "worst", "furious",
    "devastated", "disaster", "nightmare", "broken", "infuriating",
    "frustrated", "angry",
];

/// Per-hit weights and caps for the three signal families.
const LEXICON_WEIGHT: f64 = 0.35;
const LEXICON_CAP: f64 = 0.70;
const EXCLAIM_WEIGHT: f64 = 0.10;
const EXCLAIM_CAP: f64 = 0.30;
const SHOUT_WEIGHT: f64 = 0.15;
const SHOUT_CAP: f64 = 0.30;

/// Score the emotional intensity of a message in [0, 1].
pub fn intensity(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let lexicon_hits = LEXICON
        .iter()
        .filter(|word| contains_word(&lower, word))
        .count() as f64;
    let exclaims = text.chars().filter(|c| *c == '!').count() as f64;
    let shouts = text
        .split_whitespace()
        .filter(|w| w.len() >= 3 && w.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()))
        .filter(|w| w.chars().any(|c| c.is_alphabetic()))
        .count() as f64;

    let score = (lexicon_hits * LEXICON_WEIGHT).min(LEXICON_CAP)
        + (exclaims * EXCLAIM_WEIGHT).min(EXCLAIM_CAP)
        + (shouts * SHOUT_WEIGHT).min(SHOUT_CAP);
    score.min(1.0)
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric()).any(|w| w == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_text_scores_low() {
        assert!(intensity("can you list the files in that directory") < 0.2);
    }

    #[test]
    fn charged_text_crosses_the_peak_threshold() {
        let score = intensity("This is AMAZING, I love it!!!");
        assert!(score >= 0.7, "got {score}");
    }

    #[test]
    fn exclamations_alone_are_capped() {
        let score = intensity("ok!!!!!!!!!!");
        assert!(score <= EXCLAIM_CAP + f64::EPSILON);
    }

    #[test]
    fn substring_matches_do_not_count() {
        // "lovely" must not match the lexicon entry "love".
        assert!(intensity("what a lovely plain sentence") < 0.2);
    }
}
