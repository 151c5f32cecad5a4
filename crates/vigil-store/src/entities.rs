//! Append-only audit trail of extracted entity references.
//!
//! Entities live primarily in the external graph; these rows are the durable
//! local record and are never updated after insert.

use rusqlite::params;
use uuid::Uuid;

use crate::error::Result;
use crate::types::EntityRecord;
use crate::{now_rfc3339, Store};

/// Extraction payload for one entity mention.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub conversation_id: Option<String>,
    pub entity_type: String,
    pub value: String,
    pub normalized_value: String,
    pub fingerprint: String,
    pub confidence: f64,
    pub span_start: Option<i64>,
    pub span_end: Option<i64>,
}

impl Store {
    pub fn add_entity(&self, new: &NewEntity) -> Result<EntityRecord> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO entities
             (id, conversation_id, entity_type, value, normalized_value,
              fingerprint, confidence, span_start, span_end, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                new.conversation_id,
                new.entity_type,
                new.value,
                new.normalized_value,
                new.fingerprint,
                new.confidence,
                new.span_start,
                new.span_end,
                now,
            ],
        )?;
        Ok(EntityRecord {
            id,
            conversation_id: new.conversation_id.clone(),
            entity_type: new.entity_type.clone(),
            value: new.value.clone(),
            normalized_value: new.normalized_value.clone(),
            fingerprint: new.fingerprint.clone(),
            confidence: new.confidence,
            span_start: new.span_start,
            span_end: new.span_end,
            created_at: now,
        })
    }

    /// Distinct normalized values of one user's recently extracted
    /// entities, newest first, bounded below by `since_rfc3339`. Feeds the
    /// orchestrator's context fingerprint; scoping goes through the owning
    /// conversation since entity rows carry no user column.
    pub fn recent_entity_values(
        &self,
        user_id: &str,
        since_rfc3339: &str,
        limit: i64,
    ) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT e.normalized_value
             FROM entities e
             JOIN conversations c ON c.id = e.conversation_id
             WHERE c.user_id = ?1 AND e.created_at >= ?2
             GROUP BY e.normalized_value
             ORDER BY MAX(e.created_at) DESC
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![user_id, since_rfc3339, limit], |row| row.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn entities_for_conversation(&self, conversation_id: &str) -> Result<Vec<EntityRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM entities WHERE conversation_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map([conversation_id], row_to_entity)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRecord> {
    Ok(EntityRecord {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        entity_type: row.get("entity_type")?,
        value: row.get("value")?,
        normalized_value: row.get("normalized_value")?,
        fingerprint: row.get("fingerprint")?,
        confidence: row.get("confidence")?,
        span_start: row.get("span_start")?,
        span_end: row.get("span_end")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::NewSession;
    use crate::types::Role;

    fn entity_for(store: &Store, user: &str, session: &str, value: &str) {
        store
            .ensure_session(&NewSession {
                id: session.to_string(),
                user_id: Some(user.to_string()),
                ..Default::default()
            })
            .unwrap();
        let conv = store
            .add_conversation(session, Role::User, value, None, Some(user), None, None)
            .unwrap();
        store
            .add_entity(&NewEntity {
                conversation_id: Some(conv.id),
                entity_type: "topic".to_string(),
                value: value.to_string(),
                normalized_value: value.to_lowercase(),
                fingerprint: value.to_lowercase(),
                confidence: 0.9,
                span_start: None,
                span_end: None,
            })
            .unwrap();
    }

    #[test]
    fn recent_values_are_scoped_to_the_user() {
        let store = Store::open_in_memory().unwrap();
        entity_for(&store, "alice", "sa", "Kubernetes");
        entity_for(&store, "bob", "sb", "Terraform");

        let since = "2000-01-01T00:00:00+00:00";
        let alice = store.recent_entity_values("alice", since, 10).unwrap();
        assert_eq!(alice, vec!["kubernetes".to_string()]);
        let bob = store.recent_entity_values("bob", since, 10).unwrap();
        assert_eq!(bob, vec!["terraform".to_string()]);
    }

    #[test]
    fn values_outside_the_window_are_excluded() {
        let store = Store::open_in_memory().unwrap();
        entity_for(&store, "alice", "sa", "Kubernetes");

        let future = (chrono::Utc::now() + chrono::Duration::minutes(1)).to_rfc3339();
        assert!(store
            .recent_entity_values("alice", &future, 10)
            .unwrap()
            .is_empty());
    }
}
