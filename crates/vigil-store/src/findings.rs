//! Exploration findings and their per-session surfacing records.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::ExplorationFinding;
use crate::{now_rfc3339, Store};

#[derive(Debug, Clone)]
pub struct NewFinding {
    pub task_id: String,
    pub finding: String,
    pub source_context: Option<String>,
    pub confidence: f64,
    pub worth_sharing: bool,
    pub share_message: Option<String>,
}

impl Store {
    pub fn add_finding(&self, new: &NewFinding) -> Result<ExplorationFinding> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO exploration_findings
             (id, task_id, finding, source_context, confidence,
              worth_sharing, share_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                new.task_id,
                new.finding,
                new.source_context,
                new.confidence,
                new.worth_sharing as i64,
                new.share_message,
                now,
            ],
        )?;
        Ok(ExplorationFinding {
            id,
            task_id: new.task_id.clone(),
            finding: new.finding.clone(),
            source_context: new.source_context.clone(),
            confidence: new.confidence,
            worth_sharing: new.worth_sharing,
            share_message: new.share_message.clone(),
            created_at: now,
        })
    }

    pub fn get_finding(&self, id: &str) -> Result<ExplorationFinding> {
        let conn = self.conn();
        conn.query_row(
            "SELECT * FROM exploration_findings WHERE id = ?1",
            [id],
            row_to_finding,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "finding",
            id: id.to_string(),
        })
    }

    /// Findings worth sharing that have not yet been surfaced in a session.
    pub fn shareable_findings(&self, session_id: &str, limit: i64) -> Result<Vec<ExplorationFinding>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT f.* FROM exploration_findings f
             WHERE f.worth_sharing = 1
               AND NOT EXISTS (
                   SELECT 1 FROM surfaced_findings s
                   WHERE s.finding_id = f.id AND s.session_id = ?1)
             ORDER BY f.created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session_id, limit], row_to_finding)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Record that a finding was shown in a session. Returns false when it
    /// had already been surfaced there — callers use this to avoid repeats.
    pub fn surface_finding(&self, finding_id: &str, session_id: &str) -> Result<bool> {
        self.get_finding(finding_id)?;
        let conn = self.conn();
        let n = conn.execute(
            "INSERT OR IGNORE INTO surfaced_findings (finding_id, session_id, surfaced_at)
             VALUES (?1, ?2, ?3)",
            params![finding_id, session_id, now_rfc3339()],
        )?;
        Ok(n > 0)
    }
}

fn row_to_finding(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExplorationFinding> {
    let worth: i64 = row.get("worth_sharing")?;
    Ok(ExplorationFinding {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        finding: row.get("finding")?,
        source_context: row.get("source_context")?,
        confidence: row.get("confidence")?,
        worth_sharing: worth != 0,
        share_message: row.get("share_message")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surfacing_is_once_per_session() {
        let s = Store::open_in_memory().unwrap();
        let f = s
            .add_finding(&NewFinding {
                task_id: "t1".to_string(),
                finding: "rust 1.80 added lazy statics".to_string(),
                source_context: None,
                confidence: 0.9,
                worth_sharing: true,
                share_message: Some("worth mentioning".to_string()),
            })
            .unwrap();
        assert!(s.surface_finding(&f.id, "s1").unwrap());
        assert!(!s.surface_finding(&f.id, "s1").unwrap());
        assert!(s.surface_finding(&f.id, "s2").unwrap());
        assert!(s.shareable_findings("s1", 10).unwrap().is_empty());
        assert_eq!(s.shareable_findings("s3", 10).unwrap().len(), 1);
    }
}
