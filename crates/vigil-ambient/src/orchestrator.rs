//! The ambient tick loop and the engagement decision.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use vigil_core::config::AmbientConfig;
use vigil_core::events::EventSink;
use vigil_llm::LlmAdapter;
use vigil_store::missions::NewMission;
use vigil_store::notifications::NewNotification;
use vigil_store::types::{MissionStatus, NotificationPriority};
use vigil_store::Store;

use crate::activity::{ActivitySource, ActivityTracker};
use crate::error::Result;
use crate::explore::Explorer;
use crate::fingerprint::{similarity, ContextFingerprint};
use crate::routing::{route, Route};
use crate::state::{derive_state, DerivedState};
use crate::taskwarrior::TaskSource;

/// Floor and source of the per-tick activity lookback window.
const MIN_LOOKBACK_MINUTES: i64 = 10;
/// Entities folded into the context fingerprint.
const FINGERPRINT_ENTITY_LIMIT: i64 = 10;
/// Unacknowledged notifications are considered for one day.
const UNACKED_WINDOW_HOURS: i64 = 24;
/// Minimum model confidence for a proactive send.
const MIN_CONFIDENCE: f64 = 0.5;

/// What one tick did; surfaced in logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Explored,
    Notified,
    StoodDown,
}

/// The model's kickoff decision.
#[derive(Debug, Deserialize)]
struct KickoffDecision {
    send: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    priority: Option<String>,
    confidence: f64,
    #[serde(default)]
    reasoning: Option<String>,
}

fn decision_schema() -> Value {
    json!({
        "type": "object",
        "required": ["send", "confidence"],
        "properties": {
            "send": {"type": "boolean"},
            "message": {"type": "string"},
            "priority": {"type": "string", "enum": ["silent", "ambient", "conversation", "urgent"]},
            "confidence": {"type": "number"},
            "reasoning": {"type": "string"}
        }
    })
}

pub struct Orchestrator {
    store: Arc<Store>,
    llm: Arc<dyn LlmAdapter>,
    activity_source: Arc<dyn ActivitySource>,
    pub tracker: Arc<ActivityTracker>,
    tasks: Arc<dyn TaskSource>,
    sink: Arc<dyn EventSink>,
    explorer: Explorer,
    config: AmbientConfig,
    user_id: String,
    previous_fingerprint: Mutex<Option<ContextFingerprint>>,
    last_tick_at: Mutex<Option<DateTime<Utc>>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        llm: Arc<dyn LlmAdapter>,
        activity_source: Arc<dyn ActivitySource>,
        tracker: Arc<ActivityTracker>,
        tasks: Arc<dyn TaskSource>,
        sink: Arc<dyn EventSink>,
        explorer: Explorer,
        config: AmbientConfig,
        user_id: String,
    ) -> Self {
        Self {
            store,
            llm,
            activity_source,
            tracker,
            tasks,
            sink,
            explorer,
            config,
            user_id,
            previous_fingerprint: Mutex::new(None),
            last_tick_at: Mutex::new(None),
        }
    }

    /// Tick until shutdown: one `check_and_engage` pass, then a jittered
    /// sleep. The first tick waits out the startup delay.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(user_id = %self.user_id, "ambient orchestrator started");
        let startup = Duration::from_secs(self.config.startup_delay_seconds);
        tokio::select! {
            _ = tokio::time::sleep(startup) => {}
            _ = shutdown.changed() => {}
        }
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.check_and_engage().await {
                Ok(outcome) => debug!(?outcome, "ambient tick"),
                Err(e) => error!("ambient tick failed: {e}"),
            }
            let sleep = jittered(Duration::from_secs(self.config.check_interval_minutes * 60));
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = shutdown.changed() => {}
            }
        }
        info!("ambient orchestrator shutting down");
    }

    /// One pass: activity, exploration, state gates, engagement decision,
    /// routing, delivery. At most one action.
    pub async fn check_and_engage(&self) -> Result<TickOutcome> {
        let now = Utc::now();
        let lookback_minutes = self.lookback_minutes(now);

        let sample = self.activity_source.current().await;
        self.tracker.update(sample);

        let daemon = self.store.daemon_state(&self.user_id)?;
        let active = self
            .store
            .active_session_count(&self.user_id, self.config.active_session_window_minutes)?;
        let state = derive_state(&daemon, active, now, self.config.idle_threshold_minutes);

        if self.explorer.maybe_run(&self.user_id, state).await? {
            return Ok(TickOutcome::Explored);
        }

        if state != DerivedState::Available {
            debug!(?state, "not available; standing down");
            return Ok(TickOutcome::StoodDown);
        }
        if let Some(last) = parse_time(&daemon.last_proactive_contact_at) {
            let cooldown =
                chrono::Duration::minutes(self.config.min_notification_interval_minutes);
            if now - last < cooldown {
                debug!("inside proactive cooldown; standing down");
                return Ok(TickOutcome::StoodDown);
            }
        }

        let Some(snapshot) = self.should_engage(&daemon, now, lookback_minutes).await? else {
            return Ok(TickOutcome::StoodDown);
        };

        self.invoke_kickoff(snapshot).await
    }

    /// The engagement guards. Returns a context snapshot when engagement
    /// should proceed, `None` to stand down. `lookback_minutes` bounds how
    /// far back this tick's context view reaches.
    async fn should_engage(
        &self,
        daemon: &vigil_store::types::DaemonState,
        now: DateTime<Utc>,
        lookback_minutes: i64,
    ) -> Result<Option<Value>> {
        let online = self.store.online_mediums(&self.user_id)?;
        let streak = self.tracker.snapshot();

        // AFK: nothing online and no desktop activity.
        if online.is_empty() && streak.is_none() {
            debug!("user is afk");
            return Ok(None);
        }

        // Too recently active: the threshold check is strictly-less-than, so
        // exactly-at-threshold proceeds.
        if let Some(last) = parse_time(&daemon.last_interaction_at) {
            if now - last < chrono::Duration::minutes(self.config.idle_threshold_minutes) {
                debug!("user interacted too recently");
                return Ok(None);
            }
        }

        let lookback_start = (now - chrono::Duration::minutes(lookback_minutes)).to_rfc3339();
        let entities = self.store.recent_entity_values(
            &self.user_id,
            &lookback_start,
            FINGERPRINT_ENTITY_LIMIT,
        )?;
        let open_tasks = self.tasks.tasks(Some("pending")).await;
        let current = ContextFingerprint::new(
            streak.as_ref().map(|s| s.sample.key()),
            entities,
            open_tasks.iter().map(|t| t.id.clone()),
        );

        let overdue = self.tasks.overdue_ids().await;
        let since = (now - chrono::Duration::hours(UNACKED_WINDOW_HOURS)).to_rfc3339();
        let unacked = self.store.unacknowledged_since(&self.user_id, &since)?;

        let previous = {
            let mut guard = self
                .previous_fingerprint
                .lock()
                .expect("fingerprint mutex poisoned");
            guard.replace(current.clone())
        };
        if let Some(previous) = previous {
            let sim = similarity(&previous, &current);
            if sim >= self.config.context_change_threshold
                && overdue.is_empty()
                && unacked.is_empty()
            {
                debug!(similarity = sim, "context unchanged; standing down");
                return Ok(None);
            }
        }

        Ok(Some(json!({
            "activity": streak.as_ref().map(|s| s.sample.key()),
            "activity_secs": streak.as_ref().map(|s| s.accumulated_secs),
            "entities": current.entities,
            "open_task_ids": current.task_ids,
            "overdue_task_ids": overdue,
            "unacknowledged_notifications": unacked.len(),
            "online_mediums": online.iter().map(|p| p.medium.clone()).collect::<Vec<_>>(),
        })))
    }

    /// Run the short-lived kickoff mission: one structured LLM call deciding
    /// whether (and what) to send. A validation failure marks the execution
    /// failed and produces no user-visible effect.
    async fn invoke_kickoff(&self, snapshot: Value) -> Result<TickOutcome> {
        let mission = self.store.create_mission(&NewMission {
            name: "ambient-kickoff".to_string(),
            prompt: "Decide whether to proactively reach out".to_string(),
            ..Default::default()
        })?;
        self.store
            .set_mission_status(&mission.id, MissionStatus::RunningOnce)?;
        let execution = self.store.create_execution(&mission.id)?;
        self.store.start_execution(&execution.id)?;

        let prompt = format!(
            "You are an ambient assistant deciding whether to reach out to \
             your user right now. Current context:\n{}\n\n\
             Send only when you have something genuinely useful or timely. \
             Reply with send, message, priority, confidence, reasoning.",
            snapshot
        );

        let raw = match self.llm.structured(&prompt, &decision_schema()).await {
            Ok(v) => v,
            Err(e) => {
                self.store.fail_execution(&execution.id, &e.to_string())?;
                warn!(error = %e, "kickoff call failed; nothing sent");
                return Ok(TickOutcome::StoodDown);
            }
        };
        let decision: KickoffDecision = match serde_json::from_value(raw.clone()) {
            Ok(d) => d,
            Err(e) => {
                self.store.fail_execution(&execution.id, &e.to_string())?;
                warn!(error = %e, "kickoff decision malformed; nothing sent");
                return Ok(TickOutcome::StoodDown);
            }
        };

        if !decision.send || decision.confidence < MIN_CONFIDENCE || decision.message.is_empty() {
            self.store
                .finish_execution(&execution.id, Some("stand down"), Some(&raw), 0)?;
            return Ok(TickOutcome::StoodDown);
        }

        let online = self.store.online_mediums(&self.user_id)?;
        let destination = route(&online, &self.config.notification_method);
        let (medium, channel) = match &destination {
            Route::Medium { medium, channel } => (Some(medium.clone()), channel.clone()),
            Route::Desktop => (Some("desktop".to_string()), None),
            Route::None => {
                self.store
                    .finish_execution(&execution.id, Some("no route"), Some(&raw), 0)?;
                debug!("no deliverable route; standing down");
                return Ok(TickOutcome::StoodDown);
            }
        };

        let priority = decision
            .priority
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(NotificationPriority::Ambient);
        let notification = self.store.create_notification(
            &NewNotification {
                user_id: self.user_id.clone(),
                medium: medium.clone(),
                target_location: channel,
                message: decision.message.clone(),
                priority,
                reasoning: decision.reasoning.clone(),
                parent_id: None,
            },
            Some(&snapshot),
        )?;
        self.store.record_proactive_contact(&self.user_id)?;
        self.store
            .finish_execution(&execution.id, Some(&decision.message), Some(&raw), 0)?;
        self.sink.emit(
            "ambient:notification_created",
            json!({
                "notification_id": notification.id,
                "medium": medium,
                "priority": priority.to_string(),
            }),
        );
        info!(notification_id = %notification.id, "proactive notification queued");
        Ok(TickOutcome::Notified)
    }

    /// Minutes covered by this tick's activity view, clamped to
    /// [10, activity_lookback_hours·60].
    fn lookback_minutes(&self, now: DateTime<Utc>) -> i64 {
        let mut guard = self.last_tick_at.lock().expect("tick mutex poisoned");
        let previous = guard.replace(now);
        let elapsed = previous
            .map(|p| now.signed_duration_since(p).num_minutes())
            .unwrap_or(MIN_LOOKBACK_MINUTES);
        elapsed.clamp(MIN_LOOKBACK_MINUTES, self.config.activity_lookback_hours * 60)
    }
}

fn parse_time(value: &Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Uniform ±30 % jitter, seeded from the clock's sub-second noise so no
/// rand dependency is needed.
fn jittered(base: Duration) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let unit = f64::from(nanos % 10_000) / 10_000.0;
    base.mul_f64(0.7 + 0.6 * unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_thirty_percent() {
        let base = Duration::from_secs(1800);
        for _ in 0..50 {
            let j = jittered(base);
            assert!(j >= base.mul_f64(0.7) && j <= base.mul_f64(1.3), "{j:?}");
        }
    }

    #[test]
    fn decision_parses_with_optional_fields_missing() {
        let raw = json!({"send": false, "confidence": 0.2});
        let d: KickoffDecision = serde_json::from_value(raw).unwrap();
        assert!(!d.send);
        assert!(d.priority.is_none());
    }

    #[test]
    fn decision_schema_requires_send_and_confidence() {
        let schema = decision_schema();
        let ok = json!({"send": true, "confidence": 0.9, "message": "hi"});
        assert!(vigil_llm::check_schema(&ok, &schema).is_ok());
        let missing = json!({"message": "hi"});
        assert!(vigil_llm::check_schema(&missing, &schema).is_err());
    }
}
