//! Ambient notifications and their context snapshots.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{AmbientNotification, NotificationPriority, NotificationStatus};
use crate::{now_rfc3339, Store};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub medium: Option<String>,
    pub target_location: Option<String>,
    pub message: String,
    pub priority: NotificationPriority,
    pub reasoning: Option<String>,
    pub parent_id: Option<String>,
}

impl Store {
    /// Insert a pending notification, optionally with a context snapshot of
    /// what the daemon saw when it decided to reach out.
    pub fn create_notification(
        &self,
        new: &NewNotification,
        context: Option<&Value>,
    ) -> Result<AmbientNotification> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO ambient_notifications
             (id, user_id, medium, target_location, message, priority,
              reasoning, status, parent_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?9)",
            params![
                id,
                new.user_id,
                new.medium,
                new.target_location,
                new.message,
                new.priority.to_string(),
                new.reasoning,
                new.parent_id,
                now,
            ],
        )?;
        if let Some(ctx) = context {
            conn.execute(
                "INSERT INTO notification_context (notification_id, context, created_at)
                 VALUES (?1, ?2, ?3)",
                params![id, ctx.to_string(), now],
            )?;
        }
        drop(conn);
        self.get_notification(&id)
    }

    pub fn get_notification(&self, id: &str) -> Result<AmbientNotification> {
        let conn = self.conn();
        conn.query_row(
            "SELECT * FROM ambient_notifications WHERE id = ?1",
            [id],
            row_to_notification,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "notification",
            id: id.to_string(),
        })
    }

    /// External delivery agents flip pending rows to delivered or failed.
    pub fn set_notification_status(&self, id: &str, status: NotificationStatus) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE ambient_notifications SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), now_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "notification",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Acknowledge a notification, recording the response latency.
    pub fn acknowledge_notification(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        let created: Option<String> = conn
            .query_row(
                "SELECT created_at FROM ambient_notifications WHERE id = ?1",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        let created = created.ok_or_else(|| StoreError::NotFound {
            entity: "notification",
            id: id.to_string(),
        })?;
        let now = chrono::Utc::now();
        let response_secs = chrono::DateTime::parse_from_rfc3339(&created)
            .map(|t| now.signed_duration_since(t.with_timezone(&chrono::Utc)).num_seconds())
            .unwrap_or(0);
        conn.execute(
            "UPDATE ambient_notifications
             SET acknowledged = 1, acknowledged_at = ?1,
                 response_time_secs = ?2, updated_at = ?1
             WHERE id = ?3",
            params![now.to_rfc3339(), response_secs, id],
        )?;
        Ok(())
    }

    pub fn unacknowledged_since(
        &self,
        user_id: &str,
        since_rfc3339: &str,
    ) -> Result<Vec<AmbientNotification>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM ambient_notifications
             WHERE user_id = ?1 AND acknowledged = 0 AND created_at >= ?2
             ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id, since_rfc3339], row_to_notification)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<AmbientNotification> {
    let priority_str: String = row.get("priority")?;
    let status_str: String = row.get("status")?;
    let acked: i64 = row.get("acknowledged")?;
    Ok(AmbientNotification {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        medium: row.get("medium")?,
        target_location: row.get("target_location")?,
        message: row.get("message")?,
        priority: priority_str.parse().unwrap_or(NotificationPriority::Ambient),
        status: status_str.parse().unwrap_or(NotificationStatus::Pending),
        reasoning: row.get("reasoning")?,
        parent_id: row.get("parent_id")?,
        acknowledged: acked != 0,
        acknowledged_at: row.get("acknowledged_at")?,
        response_time_secs: row.get("response_time_secs")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_notification() -> NewNotification {
        NewNotification {
            user_id: "alice".to_string(),
            medium: Some("telegram".to_string()),
            target_location: Some("dm".to_string()),
            message: "found something interesting".to_string(),
            priority: NotificationPriority::Ambient,
            reasoning: None,
            parent_id: None,
        }
    }

    #[test]
    fn unacknowledged_drops_after_ack() {
        let s = Store::open_in_memory().unwrap();
        let n = s.create_notification(&new_notification(), None).unwrap();
        let since = "2000-01-01T00:00:00+00:00";
        assert_eq!(s.unacknowledged_since("alice", since).unwrap().len(), 1);
        s.acknowledge_notification(&n.id).unwrap();
        assert!(s.unacknowledged_since("alice", since).unwrap().is_empty());
        let acked = s.get_notification(&n.id).unwrap();
        assert!(acked.acknowledged);
        assert!(acked.response_time_secs.is_some());
    }
}
