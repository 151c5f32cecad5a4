//! Conversation rows and their ordinal blocks.
//!
//! Blocks are totally ordered per conversation by `ordinal`, a dense 0-based
//! sequence enforced inside one transaction per append.

use chrono::{Duration, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::types::{BlockKind, Conversation, ConversationBlock, Role};
use crate::{now_rfc3339, Store};

/// Fields for a new block append. The kind decides which fields apply.
#[derive(Debug, Clone, Default)]
pub struct NewBlock {
    pub text_content: Option<String>,
    pub tool_name: Option<String>,
    pub tool_use_id: Option<String>,
    pub tool_input: Option<serde_json::Value>,
    pub tool_output: Option<serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
}

impl Store {
    /// Insert one conversation row. Block writes are separate; an empty
    /// prompt legitimately produces a conversation with no blocks.
    #[allow(clippy::too_many_arguments)]
    pub fn add_conversation(
        &self,
        session_id: &str,
        role: Role,
        prompt: &str,
        medium: Option<&str>,
        user_id: Option<&str>,
        latency_ms: Option<i64>,
        tool_names: Option<&[String]>,
    ) -> Result<Conversation> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let tools_json = tool_names
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO conversations
             (id, session_id, role, prompt, medium, user_id, latency_ms, tool_names, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                session_id,
                role.to_string(),
                prompt,
                medium,
                user_id,
                latency_ms,
                tools_json,
                now,
            ],
        )?;
        Ok(Conversation {
            id,
            session_id: session_id.to_string(),
            role,
            prompt: prompt.to_string(),
            medium: medium.map(String::from),
            user_id: user_id.map(String::from),
            latency_ms,
            tool_names: tool_names.map(<[String]>::to_vec),
            created_at: now,
        })
    }

    /// Append a block with the next dense ordinal.
    ///
    /// Runs in an immediate transaction so the max-ordinal read and the
    /// insert cannot interleave with a concurrent append. A tool-result
    /// block must reference a tool-use block previously written to the same
    /// session.
    pub fn append_block(
        &self,
        conversation_id: &str,
        kind: BlockKind,
        block: NewBlock,
    ) -> Result<ConversationBlock> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if kind == BlockKind::ToolResult {
            let use_id = block.tool_use_id.as_deref().ok_or_else(|| {
                StoreError::InvalidInput("tool_result block requires tool_use_id".into())
            })?;
            let referenced: bool = tx
                .query_row(
                    "SELECT 1 FROM conversation_blocks b
                     JOIN conversations c ON c.id = b.conversation_id
                     WHERE b.kind = 'tool_use'
                       AND b.tool_use_id = ?1
                       AND c.session_id = (SELECT session_id FROM conversations WHERE id = ?2)",
                    params![use_id, conversation_id],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);
            if !referenced {
                return Err(StoreError::InvalidInput(format!(
                    "tool_result references unknown tool_use: {use_id}"
                )));
            }
        }

        let ordinal: i64 = tx.query_row(
            "SELECT COALESCE(MAX(ordinal) + 1, 0) FROM conversation_blocks
             WHERE conversation_id = ?1",
            [conversation_id],
            |row| row.get(0),
        )?;

        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let input_json = block.tool_input.as_ref().map(|v| v.to_string());
        let output_json = block.tool_output.as_ref().map(|v| v.to_string());
        let embedding_json = block
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        tx.execute(
            "INSERT INTO conversation_blocks
             (id, conversation_id, ordinal, kind, text_content, tool_name,
              tool_use_id, tool_input, tool_output, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                conversation_id,
                ordinal,
                kind.to_string(),
                block.text_content,
                block.tool_name,
                block.tool_use_id,
                input_json,
                output_json,
                embedding_json,
                now,
            ],
        )?;
        tx.commit()?;

        Ok(ConversationBlock {
            id,
            conversation_id: conversation_id.to_string(),
            ordinal,
            kind,
            text_content: block.text_content,
            tool_name: block.tool_name,
            tool_use_id: block.tool_use_id,
            tool_input: block.tool_input,
            tool_output: block.tool_output,
            embedding: block.embedding,
            created_at: now,
        })
    }

    pub fn blocks_for_conversation(&self, conversation_id: &str) -> Result<Vec<ConversationBlock>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM conversation_blocks
             WHERE conversation_id = ?1
             ORDER BY ordinal",
        )?;
        let rows = stmt.query_map([conversation_id], row_to_block)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn conversation_count(&self, session_id: &str) -> Result<i64> {
        let conn = self.conn();
        let n = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE session_id = ?1",
            [session_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Last `limit` messages of a session, ordered oldest → newest.
    pub fn last_messages(&self, session_id: &str, limit: i64) -> Result<Vec<Conversation>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                 SELECT * FROM conversations
                 WHERE session_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2
             ) ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![session_id, limit], row_to_conversation)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// The most recent direct message sent by a user on any medium.
    pub fn last_dm_for_user(&self, user_id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT * FROM conversations
                 WHERE user_id = ?1 AND role = 'user' AND medium IS NOT NULL
                 ORDER BY created_at DESC
                 LIMIT 1",
                [user_id],
                row_to_conversation,
            )
            .optional()?;
        Ok(row)
    }

    /// Substring recall over stored conversations, bounded by a day window.
    pub fn recall_search(
        &self,
        query: &str,
        limit: i64,
        days_back: i64,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<Vec<Conversation>> {
        let cutoff = (Utc::now() - Duration::days(days_back)).to_rfc3339();
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM conversations
             WHERE prompt LIKE ?1 ESCAPE '\\'
               AND created_at >= ?2
               AND (?3 IS NULL OR session_id = ?3)
               AND (?4 IS NULL OR user_id = ?4)
             ORDER BY created_at DESC
             LIMIT ?5",
        )?;
        let rows = stmt.query_map(
            params![pattern, cutoff, session_id, user_id, limit],
            row_to_conversation,
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

pub(crate) fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let role_str: String = row.get("role")?;
    let tools_raw: Option<String> = row.get("tool_names")?;
    Ok(Conversation {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        role: role_str.parse().unwrap_or(Role::User),
        prompt: row.get("prompt")?,
        medium: row.get("medium")?,
        user_id: row.get("user_id")?,
        latency_ms: row.get("latency_ms")?,
        tool_names: tools_raw.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at")?,
    })
}

fn row_to_block(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationBlock> {
    let kind_str: String = row.get("kind")?;
    let input_raw: Option<String> = row.get("tool_input")?;
    let output_raw: Option<String> = row.get("tool_output")?;
    let embedding_raw: Option<String> = row.get("embedding")?;
    Ok(ConversationBlock {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        ordinal: row.get("ordinal")?,
        kind: kind_str.parse().unwrap_or(BlockKind::Text),
        text_content: row.get("text_content")?,
        tool_name: row.get("tool_name")?,
        tool_use_id: row.get("tool_use_id")?,
        tool_input: input_raw.and_then(|s| serde_json::from_str(&s).ok()),
        tool_output: output_raw.and_then(|s| serde_json::from_str(&s).ok()),
        embedding: embedding_raw.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::NewSession;

    fn store_with_session() -> Store {
        let s = Store::open_in_memory().unwrap();
        s.ensure_session(&NewSession {
            id: "s1".to_string(),
            user_id: Some("alice".to_string()),
            ..Default::default()
        })
        .unwrap();
        s
    }

    #[test]
    fn ordinals_are_dense_from_zero() {
        let s = store_with_session();
        let conv = s
            .add_conversation("s1", Role::User, "hello", None, Some("alice"), None, None)
            .unwrap();
        for i in 0..4 {
            let b = s
                .append_block(
                    &conv.id,
                    BlockKind::Text,
                    NewBlock {
                        text_content: Some(format!("chunk {i}")),
                        ..Default::default()
                    },
                )
                .unwrap();
            assert_eq!(b.ordinal, i);
        }
        let blocks = s.blocks_for_conversation(&conv.id).unwrap();
        let ordinals: Vec<i64> = blocks.iter().map(|b| b.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }

    #[test]
    fn tool_result_requires_prior_tool_use() {
        let s = store_with_session();
        let conv = s
            .add_conversation("s1", Role::Assistant, "", None, None, None, None)
            .unwrap();
        let orphan = s.append_block(
            &conv.id,
            BlockKind::ToolResult,
            NewBlock {
                tool_use_id: Some("tu-1".to_string()),
                tool_output: Some(serde_json::json!({"ok": true})),
                ..Default::default()
            },
        );
        assert!(matches!(orphan, Err(StoreError::InvalidInput(_))));

        s.append_block(
            &conv.id,
            BlockKind::ToolUse,
            NewBlock {
                tool_name: Some("shell".to_string()),
                tool_use_id: Some("tu-1".to_string()),
                tool_input: Some(serde_json::json!({"cmd": "ls"})),
                ..Default::default()
            },
        )
        .unwrap();
        s.append_block(
            &conv.id,
            BlockKind::ToolResult,
            NewBlock {
                tool_use_id: Some("tu-1".to_string()),
                tool_output: Some(serde_json::json!({"ok": true})),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn last_messages_orders_oldest_first() {
        let s = store_with_session();
        for i in 0..6 {
            s.add_conversation("s1", Role::User, &format!("m{i}"), None, None, None, None)
                .unwrap();
        }
        let msgs = s.last_messages("s1", 3).unwrap();
        assert_eq!(msgs.len(), 3);
        assert!(msgs[0].created_at <= msgs[2].created_at);
    }
}
