//! The derived daemon state.
//!
//! State is never stored; it is a pure function of the daemon-state row and
//! the active-session count, so it cannot drift from the database and the
//! rule is testable in isolation.

use chrono::{DateTime, Duration, Utc};

use vigil_store::types::DaemonState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedState {
    /// A session is live right now; the daemon stays out of the way.
    Engaged,
    /// Proactivity is muted until `suppressed_until`.
    Suppressed,
    /// The user has been away longer than the idle threshold.
    Idle,
    Available,
}

/// Precedence: engaged > suppressed > idle > available.
pub fn derive_state(
    daemon: &DaemonState,
    active_session_count: i64,
    now: DateTime<Utc>,
    idle_threshold_minutes: i64,
) -> DerivedState {
    if active_session_count > 0 {
        return DerivedState::Engaged;
    }
    if let Some(until) = parse(&daemon.suppressed_until) {
        if now < until {
            return DerivedState::Suppressed;
        }
    }
    match parse(&daemon.last_interaction_at) {
        // "Older than the threshold" is strict: exactly at the threshold is
        // still available.
        Some(last) if now - last > Duration::minutes(idle_threshold_minutes) => DerivedState::Idle,
        Some(_) => DerivedState::Available,
        // Never interacted: nothing to be idle from.
        None => DerivedState::Available,
    }
}

fn parse(value: &Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daemon(
        suppressed_until: Option<DateTime<Utc>>,
        last_interaction: Option<DateTime<Utc>>,
    ) -> DaemonState {
        DaemonState {
            user_id: "alice".to_string(),
            suppressed_until: suppressed_until.map(|t| t.to_rfc3339()),
            last_interaction_at: last_interaction.map(|t| t.to_rfc3339()),
            last_proactive_contact_at: None,
            last_exploration_at: None,
            autonomous_work_count: 0,
        }
    }

    #[test]
    fn twenty_minutes_quiet_is_idle() {
        let now = Utc::now();
        let d = daemon(None, Some(now - Duration::minutes(20)));
        assert_eq!(derive_state(&d, 0, now, 15), DerivedState::Idle);
    }

    #[test]
    fn suppression_overrides_idle() {
        let now = Utc::now();
        let d = daemon(
            Some(now + Duration::minutes(5)),
            Some(now - Duration::minutes(20)),
        );
        assert_eq!(derive_state(&d, 0, now, 15), DerivedState::Suppressed);
    }

    #[test]
    fn engagement_overrides_everything() {
        let now = Utc::now();
        let d = daemon(
            Some(now + Duration::minutes(5)),
            Some(now - Duration::minutes(20)),
        );
        assert_eq!(derive_state(&d, 1, now, 15), DerivedState::Engaged);
    }

    #[test]
    fn recent_interaction_is_available() {
        let now = Utc::now();
        let d = daemon(None, Some(now - Duration::minutes(5)));
        assert_eq!(derive_state(&d, 0, now, 15), DerivedState::Available);
    }

    #[test]
    fn exactly_at_threshold_is_still_available() {
        let now = Utc::now();
        let d = daemon(None, Some(now - Duration::minutes(15)));
        assert_eq!(derive_state(&d, 0, now, 15), DerivedState::Available);
    }

    #[test]
    fn expired_suppression_is_ignored() {
        let now = Utc::now();
        let d = daemon(Some(now - Duration::minutes(1)), Some(now));
        assert_eq!(derive_state(&d, 0, now, 15), DerivedState::Available);
    }

    #[test]
    fn same_inputs_same_output() {
        let now = Utc::now();
        let d = daemon(None, Some(now - Duration::minutes(20)));
        let a = derive_state(&d, 0, now, 15);
        let b = derive_state(&d, 0, now, 15);
        assert_eq!(a, b);
    }
}
