//! Project tasks: the curiosity backlog and the exploration claim path.
//!
//! Curiosity upserts and backlog-bound enforcement run in one immediate
//! transaction per ingestion, so concurrent ingests from different mediums
//! never corrupt the per-user counts.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use vigil_core::json as extra_json;

use crate::error::{Result, StoreError};
use crate::types::{json_object, string_vec, ProjectTask, TaskStatus};
use crate::{now_rfc3339, Store};

/// Stored priority below which a pending curiosity task is pruned.
/// Exactly this value is kept; prune fires only strictly below.
pub const MIN_KEEP_PRIORITY: i64 = 15;
/// Cap applied to the repeat bonus on re-trigger.
const MAX_REPEAT_BONUS: f64 = 0.20;
const REPEAT_BONUS_STEP: f64 = 0.05;

/// One curiosity upsert: the computed score plus bookkeeping.
#[derive(Debug, Clone)]
pub struct CuriosityUpsert {
    /// Concept phrase; the upsert key is its lowercased form.
    pub title: String,
    pub description: String,
    pub curiosity_type: String,
    /// Raw score in [0, 1] from the priority function.
    pub score: f64,
    pub priority_factors: Value,
    pub ttl_days: i64,
}

/// Backlog limits applied after a batch of upserts.
#[derive(Debug, Clone, Copy)]
pub struct BacklogLimits {
    pub max_pending_per_user: i64,
    pub max_pending_per_type: i64,
}

/// What one batch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CuriosityBatchOutcome {
    pub created: usize,
    pub retriggered: usize,
    pub skipped: usize,
    pub pruned: usize,
}

impl Store {
    /// Upsert a batch of curiosity signals for one user and enforce the
    /// backlog invariants, all inside a single immediate transaction.
    pub fn process_curiosity_batch(
        &self,
        user_id: &str,
        upserts: &[CuriosityUpsert],
        limits: BacklogLimits,
    ) -> Result<CuriosityBatchOutcome> {
        if upserts.is_empty() {
            return Ok(CuriosityBatchOutcome::default());
        }
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut outcome = CuriosityBatchOutcome::default();

        for upsert in upserts {
            match upsert_one(&tx, user_id, upsert)? {
                UpsertResult::Created => outcome.created += 1,
                UpsertResult::Retriggered => outcome.retriggered += 1,
                UpsertResult::SkippedTerminal => outcome.skipped += 1,
            }
        }
        outcome.pruned = enforce_backlog(&tx, user_id, limits)?;

        tx.commit()?;
        Ok(outcome)
    }

    /// Atomically claim the highest-priority ready curiosity task.
    ///
    /// The single UPDATE-with-subselect under the connection mutex gives
    /// at-most-once claim without a separate lock.
    pub fn claim_curiosity_task(
        &self,
        user_id: &str,
        session_id: &str,
        agent_id: &str,
    ) -> Result<Option<ProjectTask>> {
        let conn = self.conn();
        let now = now_rfc3339();
        let row = conn
            .query_row(
                "UPDATE project_tasks
                 SET status = 'in_progress',
                     claim_session_id = ?1,
                     claim_agent_id = ?2,
                     claimed_at = ?3,
                     started_at = COALESCE(started_at, ?3),
                     attempt_count = attempt_count + 1,
                     updated_at = ?3
                 WHERE id = (
                     SELECT id FROM project_tasks
                     WHERE user_id = ?4 AND task_type = 'curiosity' AND status = 'ready'
                     ORDER BY priority DESC, created_at ASC
                     LIMIT 1)
                 RETURNING *",
                params![session_id, agent_id, now, user_id],
                row_to_task,
            )
            .optional()?;
        Ok(row)
    }

    /// Mark a claimed task done with its outcome.
    pub fn complete_task(&self, id: &str, outcome: &str, notes: Option<&str>) -> Result<()> {
        let conn = self.conn();
        let now = now_rfc3339();
        let n = conn.execute(
            "UPDATE project_tasks
             SET status = 'done', outcome = ?1, completion_notes = ?2,
                 completed_at = ?3, updated_at = ?3,
                 claim_session_id = NULL, claim_agent_id = NULL, claimed_at = NULL
             WHERE id = ?4 AND status = 'in_progress'",
            params![outcome, notes, now, id],
        )?;
        if n == 0 {
            return Err(StoreError::Precondition(format!(
                "task {id} is not in progress"
            )));
        }
        Ok(())
    }

    /// Return a failed claim to the ready pool with the error recorded.
    pub fn release_task(&self, id: &str, error: &str) -> Result<()> {
        let conn = self.conn();
        let now = now_rfc3339();
        conn.execute(
            "UPDATE project_tasks
             SET status = 'ready', last_error = ?1, updated_at = ?2,
                 claim_session_id = NULL, claim_agent_id = NULL, claimed_at = NULL
             WHERE id = ?3 AND status = 'in_progress'",
            params![error, now, id],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<ProjectTask> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM project_tasks WHERE id = ?1", [id], row_to_task)
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "task",
                id: id.to_string(),
            })
    }

    pub fn pending_curiosity_count(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM project_tasks
             WHERE user_id = ?1 AND task_type = 'curiosity'
               AND status IN ('backlog', 'ready', 'blocked')",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Curiosity tasks completed since the start of the current UTC day.
    pub fn explorations_today(&self, user_id: &str) -> Result<i64> {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc()
            .to_rfc3339();
        let conn = self.conn();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM project_tasks
             WHERE user_id = ?1 AND task_type = 'curiosity'
               AND status = 'done' AND completed_at >= ?2",
            params![user_id, midnight],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    pub fn pending_curiosity_tasks(&self, user_id: &str) -> Result<Vec<ProjectTask>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM project_tasks
             WHERE user_id = ?1 AND task_type = 'curiosity'
               AND status IN ('backlog', 'ready', 'blocked')
             ORDER BY priority DESC, created_at",
        )?;
        let rows = stmt.query_map([user_id], row_to_task)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

enum UpsertResult {
    Created,
    Retriggered,
    SkippedTerminal,
}

fn upsert_one(
    tx: &Transaction<'_>,
    user_id: &str,
    upsert: &CuriosityUpsert,
) -> Result<UpsertResult> {
    let now = now_rfc3339();
    let existing = tx
        .query_row(
            "SELECT * FROM project_tasks
             WHERE user_id = ?1 AND task_type = 'curiosity' AND lower(title) = lower(?2)
             ORDER BY created_at
             LIMIT 1",
            params![user_id, upsert.title],
            row_to_task,
        )
        .optional()?;

    match existing {
        Some(task) if task.status.is_terminal() => Ok(UpsertResult::SkippedTerminal),
        Some(task) => {
            let mut extra = task.extra.clone();
            let trigger_count = extra_json::get_i64(&extra, "trigger_count").unwrap_or(1) + 1;
            let bonus = (REPEAT_BONUS_STEP * trigger_count as f64).min(MAX_REPEAT_BONUS);
            let boosted = ((upsert.score + bonus).clamp(0.0, 1.0) * 100.0).floor() as i64;
            let priority = task.priority.max(boosted);

            extra_json::set(&mut extra, "trigger_count", json!(trigger_count));
            extra_json::set(&mut extra, "last_triggered_at", json!(now));
            let mut factors = extra
                .get("priority_factors")
                .cloned()
                .unwrap_or(Value::Null);
            extra_json::merge(&mut factors, &upsert.priority_factors);
            extra_json::set(&mut extra, "priority_factors", factors);

            tx.execute(
                "UPDATE project_tasks
                 SET priority = ?1, extra = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![priority, extra.to_string(), now, task.id],
            )?;
            debug!(task_id = %task.id, trigger_count, priority, "curiosity re-trigger");
            Ok(UpsertResult::Retriggered)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            let priority = (upsert.score.clamp(0.0, 1.0) * 100.0).floor() as i64;
            let extra = json!({
                "curiosity_type": upsert.curiosity_type,
                "trigger_count": 1,
                "ttl_days": upsert.ttl_days,
                "priority_factors": upsert.priority_factors,
            });
            let tags = serde_json::to_string(&[upsert.curiosity_type.as_str()])?;
            tx.execute(
                "INSERT INTO project_tasks
                 (id, title, description, task_type, tags, priority, status,
                  user_id, extra, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'curiosity', ?4, ?5, 'ready', ?6, ?7, ?8, ?8)",
                params![
                    id,
                    upsert.title,
                    upsert.description,
                    tags,
                    priority,
                    user_id,
                    extra.to_string(),
                    now,
                ],
            )?;
            Ok(UpsertResult::Created)
        }
    }
}

/// Enforce the backlog bounds inside the caller's transaction. Returns the
/// number of tasks cancelled.
///
/// Order of operations: TTL/priority prune first, then the per-type cap,
/// then the per-user cap — lowest-priority tasks go first.
fn enforce_backlog(
    tx: &Transaction<'_>,
    user_id: &str,
    limits: BacklogLimits,
) -> Result<usize> {
    let now = Utc::now();
    let pending = {
        let mut stmt = tx.prepare(
            "SELECT * FROM project_tasks
             WHERE user_id = ?1 AND task_type = 'curiosity'
               AND status IN ('backlog', 'ready', 'blocked')
             ORDER BY priority DESC, created_at",
        )?;
        let rows = stmt.query_map([user_id], row_to_task)?;
        rows.filter_map(|r| r.ok()).collect::<Vec<_>>()
    };

    let mut to_cancel: Vec<(String, &'static str)> = Vec::new();
    let mut kept: Vec<&ProjectTask> = Vec::new();

    for task in &pending {
        if task.priority < MIN_KEEP_PRIORITY {
            to_cancel.push((task.id.clone(), "below_min_priority"));
            continue;
        }
        let ttl_days = extra_json::get_i64(&task.extra, "ttl_days").unwrap_or(14);
        let effective = extra_json::get_str(&task.extra, "last_triggered_at")
            .unwrap_or(task.created_at.as_str());
        if is_older_than(effective, now, ttl_days) {
            to_cancel.push((task.id.clone(), "ttl_expired"));
            continue;
        }
        kept.push(task);
    }

    // Per-type cap: kept is already sorted best-first, so overflow within a
    // type is its lowest-priority tail.
    let mut per_type: HashMap<&str, i64> = HashMap::new();
    let mut survivors: Vec<&ProjectTask> = Vec::new();
    for task in kept {
        let ctype = extra_json::get_str(&task.extra, "curiosity_type").unwrap_or("unknown");
        let count = per_type.entry(ctype).or_insert(0);
        if *count >= limits.max_pending_per_type {
            to_cancel.push((task.id.clone(), "backlog_limits"));
            continue;
        }
        *count += 1;
        survivors.push(task);
    }

    for task in survivors.iter().skip(limits.max_pending_per_user as usize) {
        to_cancel.push((task.id.clone(), "backlog_limits"));
    }

    for (id, reason) in &to_cancel {
        cancel_task(tx, id, reason)?;
    }
    if !to_cancel.is_empty() {
        debug!(user_id, cancelled = to_cancel.len(), "backlog pruned");
    }
    Ok(to_cancel.len())
}

fn cancel_task(tx: &Transaction<'_>, id: &str, reason: &str) -> Result<()> {
    let now = now_rfc3339();
    let extra_raw: String = tx.query_row(
        "SELECT extra FROM project_tasks WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    let mut extra: Value = serde_json::from_str(&extra_raw).unwrap_or_else(|_| json!({}));
    extra_json::set(&mut extra, "pruned_reason", json!(reason));
    tx.execute(
        "UPDATE project_tasks
         SET status = 'cancelled',
             last_error = 'pruned by backlog limits',
             extra = ?1,
             updated_at = ?2
         WHERE id = ?3",
        params![extra.to_string(), now, id],
    )?;
    Ok(())
}

fn is_older_than(rfc3339: &str, now: DateTime<Utc>, ttl_days: i64) -> bool {
    match DateTime::parse_from_rfc3339(rfc3339) {
        Ok(t) => now.signed_duration_since(t.with_timezone(&Utc)) > Duration::days(ttl_days),
        Err(_) => false,
    }
}

pub(crate) fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectTask> {
    let status_str: String = row.get("status")?;
    Ok(ProjectTask {
        id: row.get("id")?,
        working_dir: row.get("working_dir")?,
        title: row.get("title")?,
        description: row.get("description")?,
        acceptance: string_vec(row.get("acceptance")?),
        scope_paths: string_vec(row.get("scope_paths")?),
        required_tools: string_vec(row.get("required_tools")?),
        task_type: row.get("task_type")?,
        tags: string_vec(row.get("tags")?),
        priority: row.get("priority")?,
        status: status_str.parse().unwrap_or(TaskStatus::Backlog),
        user_id: row.get("user_id")?,
        claim_session_id: row.get("claim_session_id")?,
        claim_agent_id: row.get("claim_agent_id")?,
        claimed_at: row.get("claimed_at")?,
        attempt_count: row.get("attempt_count")?,
        blocked_by: string_vec(row.get("blocked_by")?),
        related_task_ids: string_vec(row.get("related_task_ids")?),
        outcome: row.get("outcome")?,
        completion_notes: row.get("completion_notes")?,
        files_changed: string_vec(row.get("files_changed")?),
        last_error: row.get("last_error")?,
        extra: json_object(row.get("extra")?),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> BacklogLimits {
        BacklogLimits {
            max_pending_per_user: 100,
            max_pending_per_type: 25,
        }
    }

    fn upsert(title: &str, ctype: &str, score: f64) -> CuriosityUpsert {
        CuriosityUpsert {
            title: title.to_string(),
            description: format!("explore {title}"),
            curiosity_type: ctype.to_string(),
            score,
            priority_factors: json!({"user_interest": score}),
            ttl_days: 14,
        }
    }

    #[test]
    fn retrigger_increments_count_and_keeps_priority_monotonic() {
        let s = Store::open_in_memory().unwrap();
        for _ in 0..3 {
            s.process_curiosity_batch("alice", &[upsert("it's actually postgres", "correction", 0.6)], limits())
                .unwrap();
        }
        let tasks = s.pending_curiosity_tasks("alice").unwrap();
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(
            extra_json::get_i64(&task.extra, "trigger_count"),
            Some(3)
        );
        // floor((0.6 + min(0.20, 0.15)) * 100) = 75
        assert_eq!(task.priority, 75);
    }

    #[test]
    fn terminal_tasks_are_not_resurrected() {
        let s = Store::open_in_memory().unwrap();
        s.process_curiosity_batch("alice", &[upsert("rust macros", "unfamiliar_entity", 0.5)], limits())
            .unwrap();
        let id = s.pending_curiosity_tasks("alice").unwrap()[0].id.clone();
        let claimed = s.claim_curiosity_task("alice", "s1", "agent").unwrap().unwrap();
        assert_eq!(claimed.id, id);
        s.complete_task(&id, "explored", None).unwrap();

        let out = s
            .process_curiosity_batch("alice", &[upsert("rust macros", "unfamiliar_entity", 0.5)], limits())
            .unwrap();
        assert_eq!(out.skipped, 1);
        assert_eq!(out.created, 0);
        assert_eq!(s.pending_curiosity_count("alice").unwrap(), 0);
    }

    #[test]
    fn per_user_cap_cancels_lowest_priority() {
        let s = Store::open_in_memory().unwrap();
        // Scores spread so the overflow is deterministic. Per-type cap is
        // avoided by spreading types.
        let types = ["a", "b", "c", "d", "e", "f"];
        let mut batch = Vec::new();
        for i in 0..150u32 {
            let score = 0.20 + (i as f64) * 0.005;
            batch.push(upsert(
                &format!("topic {i}"),
                types[(i % 6) as usize],
                score.min(1.0),
            ));
        }
        s.process_curiosity_batch("alice", &batch, limits()).unwrap();
        assert_eq!(s.pending_curiosity_count("alice").unwrap(), 100);

        let conn_count: i64 = {
            let all = s.pending_curiosity_tasks("alice").unwrap();
            all.len() as i64
        };
        assert_eq!(conn_count, 100);
    }

    #[test]
    fn per_type_cap_holds() {
        let s = Store::open_in_memory().unwrap();
        let batch: Vec<_> = (0..40)
            .map(|i| upsert(&format!("entity {i}"), "unfamiliar_entity", 0.5))
            .collect();
        s.process_curiosity_batch("alice", &batch, limits()).unwrap();
        assert_eq!(s.pending_curiosity_count("alice").unwrap(), 25);
    }

    #[test]
    fn priority_fifteen_exactly_is_kept() {
        let s = Store::open_in_memory().unwrap();
        s.process_curiosity_batch("alice", &[upsert("edge", "unfamiliar_entity", 0.15)], limits())
            .unwrap();
        assert_eq!(s.pending_curiosity_count("alice").unwrap(), 1);
        s.process_curiosity_batch("alice", &[upsert("gone", "unfamiliar_entity", 0.14)], limits())
            .unwrap();
        let tasks = s.pending_curiosity_tasks("alice").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "edge");
    }

    #[test]
    fn claim_is_exclusive_and_highest_priority_first() {
        let s = Store::open_in_memory().unwrap();
        s.process_curiosity_batch(
            "alice",
            &[
                upsert("low", "a", 0.3),
                upsert("high", "b", 0.9),
            ],
            limits(),
        )
        .unwrap();
        let first = s.claim_curiosity_task("alice", "s1", "w1").unwrap().unwrap();
        assert_eq!(first.title, "high");
        assert!(first.is_claimed());
        let second = s.claim_curiosity_task("alice", "s1", "w2").unwrap().unwrap();
        assert_eq!(second.title, "low");
        assert!(s.claim_curiosity_task("alice", "s1", "w3").unwrap().is_none());
    }
}
