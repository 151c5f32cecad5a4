//! Per-session materialized context cache with a staleness bound on read,
//! plus the rolling summary-of-summaries rows.

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::types::{ContextCacheEntry, SummaryContext};
use crate::{now_rfc3339, Store};

impl Store {
    /// Upsert the cached context for a session.
    pub fn put_context(&self, session_id: &str, context: &str, metadata: &Value) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO context_cache (session_id, context, metadata, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                 context = excluded.context,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at",
            params![session_id, context, metadata.to_string(), now_rfc3339()],
        )?;
        Ok(())
    }

    /// Read the cached context if it is younger than `max_age_minutes`.
    pub fn get_context(
        &self,
        session_id: &str,
        max_age_minutes: i64,
    ) -> Result<Option<ContextCacheEntry>> {
        let cutoff = (Utc::now() - Duration::minutes(max_age_minutes)).to_rfc3339();
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT session_id, context, metadata, updated_at
                 FROM context_cache
                 WHERE session_id = ?1 AND updated_at >= ?2",
                params![session_id, cutoff],
                |row| {
                    let meta_raw: String = row.get(2)?;
                    Ok(ContextCacheEntry {
                        session_id: row.get(0)?,
                        context: row.get(1)?,
                        metadata: serde_json::from_str(&meta_raw)
                            .unwrap_or(Value::Object(Default::default())),
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// The newest rolling summary, if any.
    pub fn latest_summary_context(&self) -> Result<Option<SummaryContext>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, summary, session_ids, created_at
                 FROM summary_context
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                |row| {
                    let ids_raw: String = row.get(2)?;
                    Ok(SummaryContext {
                        id: row.get(0)?,
                        summary: row.get(1)?,
                        session_ids: serde_json::from_str(&ids_raw).unwrap_or_default(),
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Append a new rolling summary covering the given session ids.
    pub fn add_summary_context(&self, summary: &str, session_ids: &[String]) -> Result<()> {
        let ids_json = serde_json::to_string(session_ids)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO summary_context (summary, session_ids, created_at)
             VALUES (?1, ?2, ?3)",
            params![summary, ids_json, now_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_context_round_trips() {
        let s = Store::open_in_memory().unwrap();
        s.put_context("s1", "the context", &json!({"depth": 2}))
            .unwrap();
        let hit = s.get_context("s1", 30).unwrap().expect("fresh entry");
        assert_eq!(hit.context, "the context");
    }

    #[test]
    fn stale_context_is_a_miss() {
        let s = Store::open_in_memory().unwrap();
        s.put_context("s1", "old", &json!({})).unwrap();
        // A zero-minute staleness bound rejects everything not written at
        // this exact instant; backdate to be deterministic.
        {
            let conn = s.conn();
            let past = (Utc::now() - Duration::minutes(31)).to_rfc3339();
            conn.execute(
                "UPDATE context_cache SET updated_at = ?1 WHERE session_id = 's1'",
                [past],
            )
            .unwrap();
        }
        assert!(s.get_context("s1", 30).unwrap().is_none());
    }
}
