//! Versioned core-memory blocks.
//!
//! Every content change appends a `core_memory_versions` row with
//! `version = previous + 1`; version numbers are strictly monotonic per
//! block and never reused. Rollback copies an old version's content forward
//! as a brand-new version — history is never rewritten.

use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{CoreMemoryBlock, CoreMemoryVersion};
use crate::{now_rfc3339, Store};

pub const DEFAULT_CHAR_LIMIT: i64 = 8192;

/// Which uniqueness key a block lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockScope {
    /// `(user_id, block_type)` with no session — user-durable memory.
    User(String),
    /// `(session_id, block_type)` — session-scoped memory.
    Session(String),
}

impl Store {
    /// Create or update a block, appending a version row.
    ///
    /// Content longer than the block's char limit is rejected with
    /// `InvalidInput`; callers that need truncation truncate first.
    pub fn edit_core_memory(
        &self,
        scope: &BlockScope,
        block_type: &str,
        content: &str,
        reason: Option<&str>,
        char_limit: Option<i64>,
    ) -> Result<CoreMemoryBlock> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_rfc3339();

        let existing = find_block(&tx, scope, block_type)?;
        let limit = char_limit
            .or(existing.as_ref().map(|b| b.char_limit))
            .unwrap_or(DEFAULT_CHAR_LIMIT);
        if content.chars().count() as i64 > limit {
            return Err(StoreError::InvalidInput(format!(
                "content exceeds char limit {limit}"
            )));
        }

        let block = match existing {
            Some(mut block) => {
                let next = block.version + 1;
                tx.execute(
                    "UPDATE core_memory_blocks
                     SET content = ?1, version = ?2, char_limit = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![content, next, limit, now, block.id],
                )?;
                tx.execute(
                    "INSERT INTO core_memory_versions (block_id, version, content, reason, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![block.id, next, content, reason, now],
                )?;
                block.content = content.to_string();
                block.version = next;
                block.char_limit = limit;
                block.updated_at = now;
                block
            }
            None => {
                let id = Uuid::new_v4().to_string();
                let (user_id, session_id) = scope_columns(scope);
                tx.execute(
                    "INSERT INTO core_memory_blocks
                     (id, user_id, session_id, block_type, content, char_limit,
                      version, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)",
                    params![id, user_id, session_id, block_type, content, limit, now],
                )?;
                tx.execute(
                    "INSERT INTO core_memory_versions (block_id, version, content, reason, created_at)
                     VALUES (?1, 1, ?2, ?3, ?4)",
                    params![id, content, reason, now],
                )?;
                CoreMemoryBlock {
                    id,
                    user_id: user_id.map(String::from),
                    session_id: session_id.map(String::from),
                    block_type: block_type.to_string(),
                    content: content.to_string(),
                    char_limit: limit,
                    version: 1,
                    created_at: now.clone(),
                    updated_at: now,
                }
            }
        };
        tx.commit()?;
        Ok(block)
    }

    pub fn get_core_memory(
        &self,
        scope: &BlockScope,
        block_type: &str,
    ) -> Result<Option<CoreMemoryBlock>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let block = find_block(&tx, scope, block_type)?;
        tx.commit()?;
        Ok(block)
    }

    /// All blocks visible to a user-scoped read (persona, human, task, …).
    pub fn core_memory_blocks_for_user(&self, user_id: &str) -> Result<Vec<CoreMemoryBlock>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM core_memory_blocks
             WHERE user_id = ?1 AND session_id IS NULL
             ORDER BY block_type",
        )?;
        let rows = stmt.query_map([user_id], row_to_block)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Version history, newest first.
    pub fn core_memory_history(
        &self,
        scope: &BlockScope,
        block_type: &str,
        limit: i64,
    ) -> Result<Vec<CoreMemoryVersion>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let block = match find_block(&tx, scope, block_type)? {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        let versions = {
            let mut stmt = tx.prepare(
                "SELECT block_id, version, content, reason, created_at
                 FROM core_memory_versions
                 WHERE block_id = ?1
                 ORDER BY version DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![block.id, limit], |row| {
                Ok(CoreMemoryVersion {
                    block_id: row.get(0)?,
                    version: row.get(1)?,
                    content: row.get(2)?,
                    reason: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?;
            rows.filter_map(|r| r.ok()).collect::<Vec<_>>()
        };
        tx.commit()?;
        Ok(versions)
    }

    /// Restore the content of `target_version` as a new version.
    ///
    /// Fails with `Precondition` when the block or the target version does
    /// not exist.
    pub fn rollback_core_memory(
        &self,
        scope: &BlockScope,
        block_type: &str,
        target_version: i64,
        reason: Option<&str>,
    ) -> Result<CoreMemoryBlock> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_rfc3339();

        let mut block = find_block(&tx, scope, block_type)?.ok_or_else(|| {
            StoreError::Precondition(format!("no core memory block of type {block_type}"))
        })?;
        let content: String = tx
            .query_row(
                "SELECT content FROM core_memory_versions
                 WHERE block_id = ?1 AND version = ?2",
                params![block.id, target_version],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                StoreError::Precondition(format!("version {target_version} does not exist"))
            })?;

        let next = block.version + 1;
        let rollback_reason = reason
            .map(String::from)
            .unwrap_or_else(|| format!("rollback to version {target_version}"));
        tx.execute(
            "UPDATE core_memory_blocks
             SET content = ?1, version = ?2, updated_at = ?3
             WHERE id = ?4",
            params![content, next, now, block.id],
        )?;
        tx.execute(
            "INSERT INTO core_memory_versions (block_id, version, content, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![block.id, next, content, rollback_reason, now],
        )?;
        tx.commit()?;

        block.content = content;
        block.version = next;
        block.updated_at = now;
        Ok(block)
    }
}

fn scope_columns(scope: &BlockScope) -> (Option<&str>, Option<&str>) {
    match scope {
        BlockScope::User(u) => (Some(u.as_str()), None),
        BlockScope::Session(s) => (None, Some(s.as_str())),
    }
}

fn find_block(
    tx: &Transaction<'_>,
    scope: &BlockScope,
    block_type: &str,
) -> Result<Option<CoreMemoryBlock>> {
    let row = match scope {
        BlockScope::User(user_id) => tx
            .query_row(
                "SELECT * FROM core_memory_blocks
                 WHERE user_id = ?1 AND block_type = ?2 AND session_id IS NULL",
                params![user_id, block_type],
                row_to_block,
            )
            .optional()?,
        BlockScope::Session(session_id) => tx
            .query_row(
                "SELECT * FROM core_memory_blocks
                 WHERE session_id = ?1 AND block_type = ?2",
                params![session_id, block_type],
                row_to_block,
            )
            .optional()?,
    };
    Ok(row)
}

fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<CoreMemoryBlock> {
    Ok(CoreMemoryBlock {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        session_id: row.get("session_id")?,
        block_type: row.get("block_type")?,
        content: row.get("content")?,
        char_limit: row.get("char_limit")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> BlockScope {
        BlockScope::User("alice".to_string())
    }

    #[test]
    fn versions_are_contiguous_from_one() {
        let s = Store::open_in_memory().unwrap();
        for i in 1..=4 {
            let b = s
                .edit_core_memory(&scope(), "task", &format!("v{i}"), None, None)
                .unwrap();
            assert_eq!(b.version, i);
        }
        let history = s.core_memory_history(&scope(), "task", 100).unwrap();
        let versions: Vec<i64> = history.iter().map(|v| v.version).collect();
        assert_eq!(versions, vec![4, 3, 2, 1]);
    }

    #[test]
    fn rollback_appends_rather_than_rewrites() {
        let s = Store::open_in_memory().unwrap();
        s.edit_core_memory(&scope(), "task", "first", None, None)
            .unwrap();
        s.edit_core_memory(&scope(), "task", "second", None, None)
            .unwrap();
        let rolled = s
            .rollback_core_memory(&scope(), "task", 1, None)
            .unwrap();
        assert_eq!(rolled.version, 3);
        assert_eq!(rolled.content, "first");
        let b = s
            .edit_core_memory(&scope(), "task", "third", None, None)
            .unwrap();
        assert_eq!(b.version, 4);
    }

    #[test]
    fn rollback_to_missing_version_is_precondition() {
        let s = Store::open_in_memory().unwrap();
        s.edit_core_memory(&scope(), "task", "only", None, None)
            .unwrap();
        assert!(matches!(
            s.rollback_core_memory(&scope(), "task", 9, None),
            Err(StoreError::Precondition(_))
        ));
    }

    #[test]
    fn over_limit_content_is_rejected() {
        let s = Store::open_in_memory().unwrap();
        let long = "x".repeat(20);
        assert!(matches!(
            s.edit_core_memory(&scope(), "persona", &long, None, Some(10)),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn user_and_session_scopes_are_distinct() {
        let s = Store::open_in_memory().unwrap();
        s.edit_core_memory(&scope(), "task", "user level", None, None)
            .unwrap();
        s.edit_core_memory(
            &BlockScope::Session("s1".to_string()),
            "task",
            "session level",
            None,
            None,
        )
        .unwrap();
        let u = s.get_core_memory(&scope(), "task").unwrap().unwrap();
        let sess = s
            .get_core_memory(&BlockScope::Session("s1".to_string()), "task")
            .unwrap()
            .unwrap();
        assert_eq!(u.content, "user level");
        assert_eq!(sess.content, "session level");
    }
}
