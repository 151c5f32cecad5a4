//! Medium presence heartbeats.
//!
//! A medium is online iff its last heartbeat is at most 60 seconds old
//! (`PRESENCE_STALE_SECS`); frontends heartbeat at least every 30 s.

use chrono::{Duration, Utc};
use rusqlite::params;

use vigil_core::config::PRESENCE_STALE_SECS;

use crate::error::Result;
use crate::types::{string_vec, MediumPresence};
use crate::{now_rfc3339, Store};

impl Store {
    /// Upsert a heartbeat for `(medium, user)`.
    pub fn heartbeat(
        &self,
        medium: &str,
        user_id: &str,
        status: &str,
        channels: &[String],
    ) -> Result<()> {
        let channels_json = serde_json::to_string(channels)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO medium_presence (medium, user_id, status, last_heartbeat, channels)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(medium, user_id) DO UPDATE SET
                 status = excluded.status,
                 last_heartbeat = excluded.last_heartbeat,
                 channels = excluded.channels",
            params![medium, user_id, status, now_rfc3339(), channels_json],
        )?;
        Ok(())
    }

    /// Mediums whose heartbeat is within the staleness window.
    pub fn online_mediums(&self, user_id: &str) -> Result<Vec<MediumPresence>> {
        let cutoff = (Utc::now() - Duration::seconds(PRESENCE_STALE_SECS)).to_rfc3339();
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT medium, user_id, status, last_heartbeat, channels
             FROM medium_presence
             WHERE user_id = ?1 AND last_heartbeat >= ?2
             ORDER BY medium",
        )?;
        let rows = stmt.query_map(params![user_id, cutoff], row_to_presence)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn all_presence(&self, user_id: &str) -> Result<Vec<MediumPresence>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT medium, user_id, status, last_heartbeat, channels
             FROM medium_presence
             WHERE user_id = ?1
             ORDER BY medium",
        )?;
        let rows = stmt.query_map([user_id], row_to_presence)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn row_to_presence(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediumPresence> {
    Ok(MediumPresence {
        medium: row.get(0)?,
        user_id: row.get(1)?,
        status: row.get(2)?,
        last_heartbeat: row.get(3)?,
        channels: string_vec(row.get(4)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_heartbeat_is_online_stale_is_not() {
        let s = Store::open_in_memory().unwrap();
        s.heartbeat("telegram", "alice", "online", &["dm".to_string()])
            .unwrap();
        assert_eq!(s.online_mediums("alice").unwrap().len(), 1);

        // Backdate past the staleness window.
        {
            let conn = s.conn();
            let stale = (Utc::now() - Duration::seconds(PRESENCE_STALE_SECS + 5)).to_rfc3339();
            conn.execute(
                "UPDATE medium_presence SET last_heartbeat = ?1",
                [stale],
            )
            .unwrap();
        }
        assert!(s.online_mediums("alice").unwrap().is_empty());
        assert_eq!(s.all_presence("alice").unwrap().len(), 1);
    }
}
