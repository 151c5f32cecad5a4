//! Session rows: lazy creation, explicit create, idle queries for the
//! summary loop, and the continuation-chain walk.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::types::Session;
use crate::{now_rfc3339, Store};

/// Maximum continuation-chain depth tolerated before the walk gives up.
const MAX_CONTINUATION_DEPTH: usize = 32;

/// Fields accepted when creating a session. Everything is optional except
/// the id, which the caller supplies (frontends own session identity).
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub id: String,
    pub working_dir: Option<String>,
    pub continued_from: Option<String>,
    pub medium: Option<String>,
    pub user_id: Option<String>,
    pub personality: Option<String>,
    pub sandbox_policy: Option<String>,
    pub mission_id: Option<String>,
}

impl Store {
    /// Idempotent "ensure session": insert-or-ignore by primary key, then
    /// read back. Tolerates concurrent first-message races from multiple
    /// frontends; the loser of the race simply reads the winner's row.
    pub fn ensure_session(&self, new: &NewSession) -> Result<Session> {
        if new.id.is_empty() {
            return Err(StoreError::InvalidInput("session id must not be empty".into()));
        }
        let conn = self.conn();
        let now = now_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sessions
             (id, working_dir, start_time, last_activity, continued_from,
              medium, user_id, personality, sandbox_policy, mission_id)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new.id,
                new.working_dir,
                now,
                new.continued_from,
                new.medium,
                new.user_id,
                new.personality,
                new.sandbox_policy,
                new.mission_id,
            ],
        )?;
        if inserted > 0 {
            debug!(session_id = %new.id, "session created lazily");
        }
        conn.query_row(
            "SELECT * FROM sessions WHERE id = ?1",
            [&new.id],
            row_to_session,
        )
        .map_err(StoreError::from)
    }

    /// Explicit create. Fails with `Conflict` when the id already exists and
    /// rejects a `continued_from` chain that would loop back on itself.
    pub fn create_session(&self, new: &NewSession) -> Result<Session> {
        if new.id.is_empty() {
            return Err(StoreError::InvalidInput("session id must not be empty".into()));
        }
        if let Some(prior) = &new.continued_from {
            self.check_continuation_cycle(&new.id, prior)?;
        }
        let conn = self.conn();
        let now = now_rfc3339();
        let n = conn.execute(
            "INSERT OR IGNORE INTO sessions
             (id, working_dir, start_time, last_activity, continued_from,
              medium, user_id, personality, sandbox_policy, mission_id)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new.id,
                new.working_dir,
                now,
                new.continued_from,
                new.medium,
                new.user_id,
                new.personality,
                new.sandbox_policy,
                new.mission_id,
            ],
        )?;
        if n == 0 {
            return Err(StoreError::Conflict(format!(
                "session already exists: {}",
                new.id
            )));
        }
        conn.query_row(
            "SELECT * FROM sessions WHERE id = ?1",
            [&new.id],
            row_to_session,
        )
        .map_err(StoreError::from)
    }

    /// Find the most recent open session for (user, working dir, medium),
    /// creating one when none exists.
    pub fn find_or_create_session(&self, new: &NewSession) -> Result<Session> {
        let found: Option<Session> = {
            let conn = self.conn();
            conn.query_row(
                "SELECT * FROM sessions
                 WHERE end_time IS NULL
                   AND (user_id IS ?1)
                   AND (working_dir IS ?2)
                   AND (medium IS ?3)
                 ORDER BY last_activity DESC
                 LIMIT 1",
                params![new.user_id, new.working_dir, new.medium],
                row_to_session,
            )
            .optional()?
        };
        match found {
            Some(s) => Ok(s),
            None => self.ensure_session(new),
        }
    }

    pub fn get_session(&self, id: &str) -> Result<Session> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM sessions WHERE id = ?1", [id], row_to_session)
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "session",
                id: id.to_string(),
            })
    }

    /// Mark a session ended. Idempotent; the end time never precedes the
    /// start time because both come from the same clock.
    pub fn end_session(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE sessions SET end_time = ?1 WHERE id = ?2 AND end_time IS NULL",
            params![now_rfc3339(), id],
        )?;
        if n == 0 {
            // Either already ended or missing; distinguish for the caller.
            let exists: bool = conn
                .query_row("SELECT 1 FROM sessions WHERE id = ?1", [id], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(StoreError::NotFound {
                    entity: "session",
                    id: id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Bump last_activity to now.
    pub fn touch_session(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE sessions SET last_activity = ?1 WHERE id = ?2",
            params![now_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn set_session_summary(&self, id: &str, summary: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE sessions SET summary = ?1, summary_updated_at = ?2 WHERE id = ?3",
            params![summary, now_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn set_agent_session(&self, id: &str, agent_session_id: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE sessions SET agent_session_id = ?1 WHERE id = ?2",
            params![agent_session_id, id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "session",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Number of open sessions with activity inside the window. Drives the
    /// `engaged` branch of the orchestrator's derived state.
    pub fn active_session_count(&self, user_id: &str, window_minutes: i64) -> Result<i64> {
        let cutoff = (Utc::now() - Duration::minutes(window_minutes)).to_rfc3339();
        let conn = self.conn();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM sessions
             WHERE user_id = ?1 AND end_time IS NULL AND last_activity >= ?2",
            params![user_id, cutoff],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Sessions eligible for summarization: recent activity inside the
    /// lookback window, idle at least `idle_cutoff_minutes`, still open, and
    /// never summarized since their last activity.
    pub fn sessions_needing_summary(
        &self,
        lookback_hours: i64,
        idle_cutoff_minutes: i64,
    ) -> Result<Vec<Session>> {
        let now = Utc::now();
        let lookback = (now - Duration::hours(lookback_hours)).to_rfc3339();
        let idle = (now - Duration::minutes(idle_cutoff_minutes)).to_rfc3339();
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions
             WHERE last_activity >= ?1
               AND last_activity <= ?2
               AND end_time IS NULL
               AND (summary IS NULL OR summary_updated_at < last_activity)
             ORDER BY last_activity",
        )?;
        let rows = stmt.query_map(params![lookback, idle], row_to_session)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// The most recently summary-updated sessions, excluding the given ids.
    pub fn recently_summarized_sessions(
        &self,
        exclude: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Session>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions
             WHERE summary IS NOT NULL AND summary_updated_at IS NOT NULL
             ORDER BY summary_updated_at DESC
             LIMIT ?1",
        )?;
        // Over-fetch, then filter in process: the exclusion set is small
        // (bounded by the rolling-summary union) and SQLite has no array binds.
        let fetch = limit + exclude.len();
        let rows = stmt.query_map([fetch as i64], row_to_session)?;
        Ok(rows
            .filter_map(|r| r.ok())
            .filter(|s| !exclude.contains(&s.id))
            .take(limit)
            .collect())
    }

    pub fn recent_sessions(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<Session>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM sessions
             WHERE (?1 IS NULL OR user_id = ?1)
             ORDER BY last_activity DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], row_to_session)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Walk the continuation chain from `prior`, rejecting a path that
    /// reaches `candidate_id` (which would close a cycle) or exceeds the
    /// depth bound.
    fn check_continuation_cycle(&self, candidate_id: &str, prior: &str) -> Result<()> {
        let conn = self.conn();
        let mut visited: HashSet<String> = HashSet::new();
        let mut cursor = Some(prior.to_string());
        let mut depth = 0usize;
        while let Some(id) = cursor {
            if id == candidate_id || !visited.insert(id.clone()) {
                return Err(StoreError::InvalidInput(format!(
                    "continued_from chain would form a cycle at {id}"
                )));
            }
            depth += 1;
            if depth > MAX_CONTINUATION_DEPTH {
                return Err(StoreError::InvalidInput(
                    "continued_from chain too deep".into(),
                ));
            }
            cursor = conn
                .query_row(
                    "SELECT continued_from FROM sessions WHERE id = ?1",
                    [&id],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()?
                .flatten();
        }
        Ok(())
    }
}

pub(crate) fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get("id")?,
        working_dir: row.get("working_dir")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        last_activity: row.get("last_activity")?,
        continued_from: row.get("continued_from")?,
        medium: row.get("medium")?,
        user_id: row.get("user_id")?,
        personality: row.get("personality")?,
        sandbox_policy: row.get("sandbox_policy")?,
        mission_id: row.get("mission_id")?,
        agent_session_id: row.get("agent_session_id")?,
        summary: row.get("summary")?,
        summary_updated_at: row.get("summary_updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn new(id: &str) -> NewSession {
        NewSession {
            id: id.to_string(),
            user_id: Some("alice".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn ensure_session_is_idempotent() {
        let s = store();
        let a = s.ensure_session(&new("s1")).unwrap();
        let b = s.ensure_session(&new("s1")).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.start_time, b.start_time);
    }

    #[test]
    fn explicit_create_conflicts_on_duplicate() {
        let s = store();
        s.create_session(&new("s1")).unwrap();
        match s.create_session(&new("s1")) {
            Err(StoreError::Conflict(_)) => {}
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn continuation_cycle_is_rejected() {
        let s = store();
        s.create_session(&new("a")).unwrap();
        let mut b = new("b");
        b.continued_from = Some("a".to_string());
        s.create_session(&b).unwrap();
        // a -> b -> a would close the loop
        let mut a2 = new("a");
        a2.continued_from = Some("b".to_string());
        assert!(s.create_session(&a2).is_err());
    }

    #[test]
    fn end_session_sets_end_time_once() {
        let s = store();
        s.ensure_session(&new("s1")).unwrap();
        s.end_session("s1").unwrap();
        let sess = s.get_session("s1").unwrap();
        let end = sess.end_time.expect("end_time set");
        assert!(end >= sess.start_time);
        // Second end is a no-op, not an error.
        s.end_session("s1").unwrap();
    }

    #[test]
    fn end_missing_session_is_not_found() {
        let s = store();
        assert!(matches!(
            s.end_session("nope"),
            Err(StoreError::NotFound { .. })
        ));
    }
}
