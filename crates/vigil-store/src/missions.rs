//! Missions and their executions.

use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{string_vec, ExecutionStatus, Mission, MissionExecution, MissionStatus};
use crate::{now_rfc3339, Store};

#[derive(Debug, Clone, Default)]
pub struct NewMission {
    pub name: String,
    pub prompt: String,
    pub schedule: Option<String>,
    pub sandbox_policy: Option<String>,
    pub personality: Option<String>,
    pub model: Option<String>,
    pub tools: Vec<String>,
}

impl Store {
    pub fn create_mission(&self, new: &NewMission) -> Result<Mission> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let tools = serde_json::to_string(&new.tools)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO missions
             (id, name, prompt, schedule, sandbox_policy, personality, model,
              tools, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?9)",
            params![
                id,
                new.name,
                new.prompt,
                new.schedule,
                new.sandbox_policy,
                new.personality,
                new.model,
                tools,
                now,
            ],
        )?;
        drop(conn);
        self.get_mission(&id)
    }

    pub fn get_mission(&self, id: &str) -> Result<Mission> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM missions WHERE id = ?1", [id], row_to_mission)
            .optional()?
            .ok_or_else(|| StoreError::NotFound {
                entity: "mission",
                id: id.to_string(),
            })
    }

    pub fn list_missions(&self) -> Result<Vec<Mission>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT * FROM missions ORDER BY created_at")?;
        let rows = stmt.query_map([], row_to_mission)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn set_mission_status(&self, id: &str, status: MissionStatus) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE missions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.to_string(), now_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "mission",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete_mission(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM mission_executions WHERE mission_id = ?1",
            [id],
        )?;
        let n = conn.execute("DELETE FROM missions WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                entity: "mission",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    pub fn create_execution(&self, mission_id: &str) -> Result<MissionExecution> {
        // Mission must exist; FK alone would surface as a bare constraint error.
        self.get_mission(mission_id)?;
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO mission_executions (id, mission_id, status, created_at)
             VALUES (?1, ?2, 'pending', ?3)",
            params![id, mission_id, now],
        )?;
        drop(conn);
        self.get_execution(&id)
    }

    pub fn get_execution(&self, id: &str) -> Result<MissionExecution> {
        let conn = self.conn();
        conn.query_row(
            "SELECT * FROM mission_executions WHERE id = ?1",
            [id],
            row_to_execution,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            entity: "execution",
            id: id.to_string(),
        })
    }

    pub fn executions_for_mission(&self, mission_id: &str, limit: i64) -> Result<Vec<MissionExecution>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM mission_executions
             WHERE mission_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![mission_id, limit], row_to_execution)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn start_execution(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute(
            "UPDATE mission_executions SET status = 'running', started_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![now_rfc3339(), id],
        )?;
        if n == 0 {
            return Err(StoreError::Precondition(format!(
                "execution {id} is not pending"
            )));
        }
        Ok(())
    }

    pub fn finish_execution(
        &self,
        id: &str,
        output: Option<&str>,
        structured_output: Option<&Value>,
        tool_count: i64,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE mission_executions
             SET status = 'completed', completed_at = ?1, output = ?2,
                 structured_output = ?3, tool_count = ?4
             WHERE id = ?5",
            params![
                now_rfc3339(),
                output,
                structured_output.map(|v| v.to_string()),
                tool_count,
                id,
            ],
        )?;
        Ok(())
    }

    pub fn fail_execution(&self, id: &str, error: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE mission_executions
             SET status = 'failed', completed_at = ?1, error = ?2
             WHERE id = ?3",
            params![now_rfc3339(), error, id],
        )?;
        Ok(())
    }
}

fn row_to_mission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Mission> {
    let status_str: String = row.get("status")?;
    Ok(Mission {
        id: row.get("id")?,
        name: row.get("name")?,
        prompt: row.get("prompt")?,
        schedule: row.get("schedule")?,
        sandbox_policy: row.get("sandbox_policy")?,
        personality: row.get("personality")?,
        model: row.get("model")?,
        tools: string_vec(row.get("tools")?),
        status: status_str.parse().unwrap_or(MissionStatus::Active),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<MissionExecution> {
    let status_str: String = row.get("status")?;
    let structured_raw: Option<String> = row.get("structured_output")?;
    Ok(MissionExecution {
        id: row.get("id")?,
        mission_id: row.get("mission_id")?,
        status: status_str.parse().unwrap_or(ExecutionStatus::Pending),
        started_at: row.get("started_at")?,
        completed_at: row.get("completed_at")?,
        output: row.get("output")?,
        structured_output: structured_raw.and_then(|s| serde_json::from_str(&s).ok()),
        tool_count: row.get("tool_count")?,
        error: row.get("error")?,
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_lifecycle() {
        let s = Store::open_in_memory().unwrap();
        let m = s
            .create_mission(&NewMission {
                name: "morning check".to_string(),
                prompt: "look for anything worth flagging".to_string(),
                ..Default::default()
            })
            .unwrap();
        let e = s.create_execution(&m.id).unwrap();
        s.start_execution(&e.id).unwrap();
        assert!(matches!(
            s.start_execution(&e.id),
            Err(StoreError::Precondition(_))
        ));
        s.finish_execution(&e.id, Some("nothing new"), None, 0).unwrap();
        let done = s.get_execution(&e.id).unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert!(done.completed_at.is_some());
    }
}
