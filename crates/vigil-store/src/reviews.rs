//! Contradiction review queue.
//!
//! A pending review is the safety interlock: the new fact must not reach
//! the graph until a resolution of `accepted-new` or `kept-both` is
//! recorded.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{string_vec, ContradictionReview, ReviewStatus};
use crate::{now_rfc3339, Store};

/// Payload for a new review row.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub new_fact: String,
    pub existing_fact_uuid: String,
    pub existing_fact: String,
    pub similarity: f64,
    pub reason: Option<String>,
    pub source: Option<String>,
    pub context: Option<String>,
    pub entity_names: Vec<String>,
    pub group_id: String,
}

impl Store {
    pub fn create_review(&self, new: &NewReview) -> Result<ContradictionReview> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let names = serde_json::to_string(&new.entity_names)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO contradiction_reviews
             (id, new_fact, existing_fact_uuid, existing_fact, similarity,
              reason, source, context, entity_names, group_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11)",
            params![
                id,
                new.new_fact,
                new.existing_fact_uuid,
                new.existing_fact,
                new.similarity,
                new.reason,
                new.source,
                new.context,
                names,
                new.group_id,
                now,
            ],
        )?;
        Ok(ContradictionReview {
            id,
            new_fact: new.new_fact.clone(),
            existing_fact_uuid: new.existing_fact_uuid.clone(),
            existing_fact: new.existing_fact.clone(),
            similarity: new.similarity,
            reason: new.reason.clone(),
            source: new.source.clone(),
            context: new.context.clone(),
            entity_names: new.entity_names.clone(),
            group_id: new.group_id.clone(),
            status: ReviewStatus::Pending,
            resolution: None,
            resolver: None,
            resolved_at: None,
            created_at: now,
        })
    }

    pub fn get_review(&self, id: &str) -> Result<ContradictionReview> {
        let conn = self.conn();
        conn.query_row(
            "SELECT * FROM contradiction_reviews WHERE id = ?1",
            [id],
            row_to_review,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "review",
            id: id.to_string(),
        })
    }

    pub fn pending_reviews(&self, group_id: &str, limit: i64) -> Result<Vec<ContradictionReview>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM contradiction_reviews
             WHERE group_id = ?1 AND status = 'pending'
             ORDER BY created_at
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![group_id, limit], row_to_review)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Transition a pending review to a resolution. Resolving a review that
    /// is not pending is a precondition failure.
    pub fn resolve_review(
        &self,
        id: &str,
        status: ReviewStatus,
        resolution: &str,
        resolver: &str,
    ) -> Result<ContradictionReview> {
        if status == ReviewStatus::Pending {
            return Err(StoreError::InvalidInput(
                "resolution status must not be pending".into(),
            ));
        }
        let conn = self.conn();
        let now = now_rfc3339();
        let n = conn.execute(
            "UPDATE contradiction_reviews
             SET status = ?1, resolution = ?2, resolver = ?3, resolved_at = ?4
             WHERE id = ?5 AND status = 'pending'",
            params![status.to_string(), resolution, resolver, now, id],
        )?;
        if n == 0 {
            return Err(StoreError::Precondition(format!(
                "review {id} is not pending"
            )));
        }
        drop(conn);
        self.get_review(id)
    }
}

fn row_to_review(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContradictionReview> {
    let status_str: String = row.get("status")?;
    Ok(ContradictionReview {
        id: row.get("id")?,
        new_fact: row.get("new_fact")?,
        existing_fact_uuid: row.get("existing_fact_uuid")?,
        existing_fact: row.get("existing_fact")?,
        similarity: row.get("similarity")?,
        reason: row.get("reason")?,
        source: row.get("source")?,
        context: row.get("context")?,
        entity_names: string_vec(row.get("entity_names")?),
        group_id: row.get("group_id")?,
        status: status_str.parse().unwrap_or(ReviewStatus::Pending),
        resolution: row.get("resolution")?,
        resolver: row.get("resolver")?,
        resolved_at: row.get("resolved_at")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> NewReview {
        NewReview {
            new_fact: "Paris is the capital of Germany.".to_string(),
            existing_fact_uuid: "f-1".to_string(),
            existing_fact: "Paris is the capital of France.".to_string(),
            similarity: 0.82,
            reason: Some("conflicting capital claims".to_string()),
            source: Some("exploration".to_string()),
            context: None,
            entity_names: vec!["Paris".to_string()],
            group_id: "default".to_string(),
        }
    }

    #[test]
    fn resolve_transitions_once() {
        let s = Store::open_in_memory().unwrap();
        let r = s.create_review(&review()).unwrap();
        let resolved = s
            .resolve_review(&r.id, ReviewStatus::KeptOld, "kept prior fact", "human")
            .unwrap();
        assert_eq!(resolved.status, ReviewStatus::KeptOld);
        assert!(resolved.resolved_at.is_some());
        assert!(matches!(
            s.resolve_review(&r.id, ReviewStatus::Dismissed, "again", "human"),
            Err(StoreError::Precondition(_))
        ));
    }

    #[test]
    fn commits_fact_only_for_accepting_resolutions() {
        assert!(ReviewStatus::AcceptedNew.commits_fact());
        assert!(ReviewStatus::KeptBoth.commits_fact());
        assert!(!ReviewStatus::KeptOld.commits_fact());
        assert!(!ReviewStatus::Dismissed.commits_fact());
        assert!(!ReviewStatus::Pending.commits_fact());
    }
}
