//! The short-lived model-job queue: at-most-once claim, bounded retry,
//! lease reaping, and status visibility.
//!
//! Priority here is ascending — smaller integer wins. This is deliberately
//! the opposite of project-task priority and the two are never unified.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::types::{json_object, QueueStatus, QueueTask};
use crate::{now_rfc3339, Store};

/// Counts by status plus per-model pending breakdown.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub pending_by_model: HashMap<String, i64>,
}

impl Store {
    /// Enqueue a job. Returns its id.
    pub fn enqueue(
        &self,
        task_type: &str,
        model_name: &str,
        content: &str,
        metadata: &Value,
        priority: i64,
        session_id: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn();
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO task_queue
             (task_type, model_name, content, metadata, priority, status,
              session_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7, ?7)",
            params![
                task_type,
                model_name,
                content,
                metadata.to_string(),
                priority,
                session_id,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Atomically claim the best pending job for a model.
    ///
    /// One UPDATE with a subselect, executed under the connection mutex:
    /// no two workers can observe the same row as pending. Ties on priority
    /// break by oldest `created_at`.
    pub fn claim(&self, model_name: &str) -> Result<Option<QueueTask>> {
        let conn = self.conn();
        let now = now_rfc3339();
        let row = conn
            .query_row(
                "UPDATE task_queue
                 SET status = 'processing', processed_at = NULL, updated_at = ?1
                 WHERE id = (
                     SELECT id FROM task_queue
                     WHERE status = 'pending' AND model_name = ?2
                     ORDER BY priority ASC, created_at ASC
                     LIMIT 1)
                 RETURNING *",
                params![now, model_name],
                row_to_queue_task,
            )
            .optional()?;
        Ok(row)
    }

    /// Terminal transition. `status` must be completed or failed.
    pub fn complete(&self, id: i64, status: QueueStatus) -> Result<()> {
        if !matches!(status, QueueStatus::Completed | QueueStatus::Failed) {
            return Err(StoreError::InvalidInput(format!(
                "complete() requires a terminal status, got {status}"
            )));
        }
        let conn = self.conn();
        let now = now_rfc3339();
        let n = conn.execute(
            "UPDATE task_queue
             SET status = ?1, processed_at = ?2, updated_at = ?2
             WHERE id = ?3 AND status = 'processing'",
            params![status.to_string(), now, id],
        )?;
        if n == 0 {
            return Err(StoreError::Precondition(format!(
                "task {id} is not processing"
            )));
        }
        Ok(())
    }

    /// Return a failing job to the pending pool, or fail it permanently once
    /// retries are exhausted.
    pub fn retry(&self, id: i64, reason: &str, max_retries: i64) -> Result<QueueStatus> {
        let conn = self.conn();
        let now = now_rfc3339();
        let retry_count: Option<i64> = conn
            .query_row(
                "SELECT retry_count FROM task_queue
                 WHERE id = ?1 AND status IN ('processing', 'failed')",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let retry_count = retry_count.ok_or_else(|| {
            StoreError::Precondition(format!("task {id} is not retryable"))
        })?;

        let next = retry_count + 1;
        let new_status = if next < max_retries {
            QueueStatus::Pending
        } else {
            QueueStatus::Failed
        };
        conn.execute(
            "UPDATE task_queue
             SET status = ?1, retry_count = ?2, error_message = ?3,
                 processed_at = CASE WHEN ?1 = 'failed' THEN ?4 ELSE NULL END,
                 updated_at = ?4
             WHERE id = ?5",
            params![new_status.to_string(), next, reason, now, id],
        )?;
        debug!(task_id = id, retry = next, status = %new_status, "task retried");
        Ok(new_status)
    }

    /// Return abandoned `processing` rows to `pending`, counting the lost
    /// lease as a retry. Rows at the retry cap go to `failed`.
    pub fn reap_expired(&self, lease_timeout_minutes: i64, max_retries: i64) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::minutes(lease_timeout_minutes)).to_rfc3339();
        let ids: Vec<i64> = {
            let conn = self.conn();
            let mut stmt = conn.prepare(
                "SELECT id FROM task_queue
                 WHERE status = 'processing' AND updated_at < ?1",
            )?;
            let rows = stmt.query_map([cutoff], |row| row.get(0))?;
            rows.filter_map(|r| r.ok()).collect()
        };
        for id in &ids {
            if let Err(e) = self.retry(*id, "lease expired", max_retries) {
                warn!(task_id = id, error = %e, "reaper failed to return task");
            }
        }
        Ok(ids.len())
    }

    pub fn get_queue_task(&self, id: i64) -> Result<QueueTask> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM task_queue WHERE id = ?1", [id], row_to_queue_task)
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "queue task",
                id: id.to_string(),
            })
    }

    pub fn queue_stats(&self) -> Result<QueueStats> {
        let conn = self.conn();
        let mut stats = QueueStats::default();
        {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM task_queue GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows.filter_map(|r| r.ok()) {
                match row.0.as_str() {
                    "pending" => stats.pending = row.1,
                    "processing" => stats.processing = row.1,
                    "completed" => stats.completed = row.1,
                    "failed" => stats.failed = row.1,
                    _ => {}
                }
            }
        }
        {
            let mut stmt = conn.prepare(
                "SELECT model_name, COUNT(*) FROM task_queue
                 WHERE status = 'pending' GROUP BY model_name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for (model, n) in rows.filter_map(|r| r.ok()) {
                stats.pending_by_model.insert(model, n);
            }
        }
        Ok(stats)
    }

    /// Remove terminal rows older than the given age.
    pub fn delete_completed(&self, older_than_hours: i64) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::hours(older_than_hours)).to_rfc3339();
        let conn = self.conn();
        let n = conn.execute(
            "DELETE FROM task_queue
             WHERE status IN ('completed', 'failed') AND updated_at < ?1",
            [cutoff],
        )?;
        Ok(n)
    }
}

fn row_to_queue_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<QueueTask> {
    let status_str: String = row.get("status")?;
    Ok(QueueTask {
        id: row.get("id")?,
        task_type: row.get("task_type")?,
        model_name: row.get("model_name")?,
        content: row.get("content")?,
        metadata: json_object(row.get("metadata")?),
        priority: row.get("priority")?,
        status: status_str.parse().unwrap_or(QueueStatus::Pending),
        session_id: row.get("session_id")?,
        retry_count: row.get("retry_count")?,
        error_message: row.get("error_message")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        processed_at: row.get("processed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enqueue(s: &Store, priority: i64) -> i64 {
        s.enqueue("summary", "X", "content", &json!({}), priority, None)
            .unwrap()
    }

    #[test]
    fn claim_takes_smallest_priority_then_oldest() {
        let s = Store::open_in_memory().unwrap();
        enqueue(&s, 10);
        let id_5 = enqueue(&s, 5);
        enqueue(&s, 10);
        let first = s.claim("X").unwrap().unwrap();
        assert_eq!(first.id, id_5);
        assert_eq!(first.status, QueueStatus::Processing);
    }

    #[test]
    fn claim_for_other_model_sees_nothing() {
        let s = Store::open_in_memory().unwrap();
        enqueue(&s, 1);
        assert!(s.claim("Y").unwrap().is_none());
    }

    #[test]
    fn retry_bounds_then_fails() {
        let s = Store::open_in_memory().unwrap();
        let id = enqueue(&s, 1);
        s.claim("X").unwrap().unwrap();
        assert_eq!(s.retry(id, "t1", 3).unwrap(), QueueStatus::Pending);
        s.claim("X").unwrap().unwrap();
        assert_eq!(s.retry(id, "t2", 3).unwrap(), QueueStatus::Pending);
        s.claim("X").unwrap().unwrap();
        assert_eq!(s.retry(id, "t3", 3).unwrap(), QueueStatus::Failed);
        let task = s.get_queue_task(id).unwrap();
        assert_eq!(task.retry_count, 3);
        assert_eq!(task.error_message.as_deref(), Some("t3"));
    }

    #[test]
    fn complete_requires_processing() {
        let s = Store::open_in_memory().unwrap();
        let id = enqueue(&s, 1);
        assert!(matches!(
            s.complete(id, QueueStatus::Completed),
            Err(StoreError::Precondition(_))
        ));
        s.claim("X").unwrap().unwrap();
        s.complete(id, QueueStatus::Completed).unwrap();
        let task = s.get_queue_task(id).unwrap();
        assert!(task.processed_at.is_some());
    }

    #[test]
    fn stats_group_by_status_and_model() {
        let s = Store::open_in_memory().unwrap();
        enqueue(&s, 1);
        enqueue(&s, 2);
        s.enqueue("summary", "Y", "c", &json!({}), 1, None).unwrap();
        s.claim("X").unwrap().unwrap();
        let stats = s.queue_stats().unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.processing, 1);
        assert_eq!(stats.pending_by_model.get("X"), Some(&1));
        assert_eq!(stats.pending_by_model.get("Y"), Some(&1));
    }
}
