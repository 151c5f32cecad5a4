//! Per-user daemon bookkeeping, created lazily on first reference.

use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::types::DaemonState;
use crate::{now_rfc3339, Store};

impl Store {
    /// Fetch the user's daemon state, creating the row when missing.
    pub fn daemon_state(&self, user_id: &str) -> Result<DaemonState> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR IGNORE INTO daemon_state (user_id) VALUES (?1)",
            [user_id],
        )?;
        conn.query_row(
            "SELECT * FROM daemon_state WHERE user_id = ?1",
            [user_id],
            row_to_state,
        )
        .map_err(Into::into)
    }

    pub fn record_interaction(&self, user_id: &str) -> Result<()> {
        self.daemon_state(user_id)?;
        let conn = self.conn();
        conn.execute(
            "UPDATE daemon_state SET last_interaction_at = ?1 WHERE user_id = ?2",
            params![now_rfc3339(), user_id],
        )?;
        Ok(())
    }

    /// Stamp a proactive contact: the cooldown reference and the interaction
    /// marker move together.
    pub fn record_proactive_contact(&self, user_id: &str) -> Result<()> {
        self.daemon_state(user_id)?;
        let conn = self.conn();
        let now = now_rfc3339();
        conn.execute(
            "UPDATE daemon_state
             SET last_proactive_contact_at = ?1, last_interaction_at = ?1
             WHERE user_id = ?2",
            params![now, user_id],
        )?;
        Ok(())
    }

    pub fn record_exploration(&self, user_id: &str) -> Result<()> {
        self.daemon_state(user_id)?;
        let conn = self.conn();
        conn.execute(
            "UPDATE daemon_state
             SET last_exploration_at = ?1,
                 autonomous_work_count = autonomous_work_count + 1
             WHERE user_id = ?2",
            params![now_rfc3339(), user_id],
        )?;
        Ok(())
    }

    pub fn suppress_until(&self, user_id: &str, until_rfc3339: Option<&str>) -> Result<()> {
        self.daemon_state(user_id)?;
        let conn = self.conn();
        conn.execute(
            "UPDATE daemon_state SET suppressed_until = ?1 WHERE user_id = ?2",
            params![until_rfc3339, user_id],
        )?;
        Ok(())
    }
}

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<DaemonState> {
    Ok(DaemonState {
        user_id: row.get("user_id")?,
        suppressed_until: row.get("suppressed_until")?,
        last_interaction_at: row.get("last_interaction_at")?,
        last_proactive_contact_at: row.get("last_proactive_contact_at")?,
        last_exploration_at: row.get("last_exploration_at")?,
        autonomous_work_count: row.get("autonomous_work_count")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_is_created_lazily_and_counts_work() {
        let s = Store::open_in_memory().unwrap();
        let st = s.daemon_state("alice").unwrap();
        assert_eq!(st.autonomous_work_count, 0);
        assert!(st.last_interaction_at.is_none());

        s.record_exploration("alice").unwrap();
        s.record_exploration("alice").unwrap();
        let st = s.daemon_state("alice").unwrap();
        assert_eq!(st.autonomous_work_count, 2);
        assert!(st.last_exploration_at.is_some());
    }
}
