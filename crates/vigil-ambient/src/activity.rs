//! Desktop activity sampling and the streak tracker.
//!
//! The actual monitor is an external collaborator behind [`ActivitySource`];
//! the tracker only accumulates how long the same `(app, title)` pair has
//! been in the foreground.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One foreground-window observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivitySample {
    pub app: String,
    pub title: String,
}

impl ActivitySample {
    /// The streak key.
    pub fn key(&self) -> String {
        format!("{}::{}", self.app, self.title)
    }
}

/// Where activity samples come from. Deployments without a desktop monitor
/// plug in [`NoActivity`].
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn current(&self) -> Option<ActivitySample>;
}

pub struct NoActivity;

#[async_trait]
impl ActivitySource for NoActivity {
    async fn current(&self) -> Option<ActivitySample> {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Streak {
    pub sample: ActivitySample,
    pub accumulated_secs: i64,
    pub started_at: DateTime<Utc>,
}

/// Accumulates seconds while the `(app, title)` key is unchanged and resets
/// on change.
#[derive(Default)]
pub struct ActivityTracker {
    current: Mutex<Option<Streak>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a new observation. `None` clears the streak.
    pub fn update(&self, sample: Option<ActivitySample>) {
        let mut guard = self.current.lock().expect("activity tracker poisoned");
        let now = Utc::now();
        match (guard.as_mut(), sample) {
            (Some(streak), Some(sample)) if streak.sample.key() == sample.key() => {
                streak.accumulated_secs = now.signed_duration_since(streak.started_at).num_seconds();
            }
            (_, Some(sample)) => {
                *guard = Some(Streak {
                    sample,
                    accumulated_secs: 0,
                    started_at: now,
                });
            }
            (_, None) => *guard = None,
        }
    }

    pub fn snapshot(&self) -> Option<Streak> {
        self.current.lock().expect("activity tracker poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(app: &str, title: &str) -> ActivitySample {
        ActivitySample {
            app: app.to_string(),
            title: title.to_string(),
        }
    }

    #[test]
    fn streak_survives_same_key_and_resets_on_change() {
        let tracker = ActivityTracker::new();
        tracker.update(Some(sample("code", "main.rs")));
        let first = tracker.snapshot().unwrap();
        tracker.update(Some(sample("code", "main.rs")));
        let second = tracker.snapshot().unwrap();
        assert_eq!(first.started_at, second.started_at);

        tracker.update(Some(sample("browser", "docs")));
        let third = tracker.snapshot().unwrap();
        assert_eq!(third.accumulated_secs, 0);
        assert_eq!(third.sample.app, "browser");
    }

    #[test]
    fn none_clears_the_streak() {
        let tracker = ActivityTracker::new();
        tracker.update(Some(sample("code", "main.rs")));
        tracker.update(None);
        assert!(tracker.snapshot().is_none());
    }
}
