//! In-memory emotion stimulus buffer with exponential decay.
//!
//! Capture pushes one stimulus per scored turn; `GET /emotion/summary`
//! reads the decayed aggregate. Nothing here persists — mood is transient
//! by design.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Stimuli older than this are dropped on write.
const RETENTION_HOURS: i64 = 4;
/// Weight halves every this many minutes.
const HALF_LIFE_MINUTES: f64 = 30.0;

#[derive(Debug, Clone, Serialize)]
pub struct Stimulus {
    pub intensity: f64,
    /// Short label of what triggered it (truncated message text).
    pub label: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct EmotionSummary {
    /// Decay-weighted average intensity of the retained stimuli.
    pub current_intensity: f64,
    /// The strongest decayed stimulus, if any.
    pub peak: Option<Stimulus>,
    pub stimulus_count: usize,
}

#[derive(Default)]
pub struct EmotionBuffer {
    inner: Mutex<Vec<Stimulus>>,
}

impl EmotionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, intensity: f64, label: &str) {
        let mut buf = self.inner.lock().expect("emotion buffer poisoned");
        let cutoff = Utc::now() - Duration::hours(RETENTION_HOURS);
        buf.retain(|s| s.at >= cutoff);
        buf.push(Stimulus {
            intensity: intensity.clamp(0.0, 1.0),
            label: label.chars().take(80).collect(),
            at: Utc::now(),
        });
    }

    pub fn summary(&self) -> EmotionSummary {
        let buf = self.inner.lock().expect("emotion buffer poisoned");
        let now = Utc::now();
        let mut weight_sum = 0.0;
        let mut weighted = 0.0;
        let mut peak: Option<(f64, &Stimulus)> = None;

        for s in buf.iter() {
            let age_min = now.signed_duration_since(s.at).num_seconds() as f64 / 60.0;
            let weight = 0.5f64.powf(age_min / HALF_LIFE_MINUTES);
            weight_sum += weight;
            weighted += weight * s.intensity;
            let decayed = weight * s.intensity;
            if peak.as_ref().map(|(p, _)| decayed > *p).unwrap_or(true) {
                peak = Some((decayed, s));
            }
        }

        EmotionSummary {
            current_intensity: if weight_sum > 0.0 {
                weighted / weight_sum
            } else {
                0.0
            },
            peak: peak.map(|(_, s)| s.clone()),
            stimulus_count: buf.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_summarizes_to_zero() {
        let buf = EmotionBuffer::new();
        let s = buf.summary();
        assert_eq!(s.current_intensity, 0.0);
        assert!(s.peak.is_none());
    }

    #[test]
    fn fresh_stimuli_dominate_the_average() {
        let buf = EmotionBuffer::new();
        buf.push(0.9, "this is amazing");
        buf.push(0.8, "great stuff");
        let s = buf.summary();
        assert!(s.current_intensity > 0.7);
        assert_eq!(s.stimulus_count, 2);
        assert_eq!(s.peak.unwrap().label, "this is amazing");
    }

    #[test]
    fn labels_are_truncated() {
        let buf = EmotionBuffer::new();
        buf.push(0.5, &"x".repeat(500));
        assert_eq!(buf.summary().peak.unwrap().label.len(), 80);
    }
}
