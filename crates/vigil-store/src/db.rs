use rusqlite::Connection;

use crate::error::Result;

/// Initialise every table and index. Safe to call on each startup — uses
/// `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_session_tables(conn)?;
    create_conversation_tables(conn)?;
    create_task_tables(conn)?;
    create_memory_tables(conn)?;
    create_integration_tables(conn)?;
    create_ambient_tables(conn)?;
    Ok(())
}

fn create_session_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id                 TEXT PRIMARY KEY,
            working_dir        TEXT,
            start_time         TEXT NOT NULL,
            end_time           TEXT,
            last_activity      TEXT NOT NULL,
            continued_from     TEXT,
            medium             TEXT,
            user_id            TEXT,
            personality        TEXT,
            sandbox_policy     TEXT,
            mission_id         TEXT,
            agent_session_id   TEXT,
            summary            TEXT,
            summary_updated_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user
            ON sessions(user_id, last_activity DESC);

        CREATE TABLE IF NOT EXISTS context_cache (
            session_id TEXT PRIMARY KEY,
            context    TEXT NOT NULL,
            metadata   TEXT NOT NULL DEFAULT '{}',
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS summary_context (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            summary     TEXT NOT NULL,
            session_ids TEXT NOT NULL DEFAULT '[]',
            created_at  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_conversation_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversations (
            id         TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            role       TEXT NOT NULL,
            prompt     TEXT NOT NULL,
            medium     TEXT,
            user_id    TEXT,
            latency_ms INTEGER,
            tool_names TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conv_session
            ON conversations(session_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_conv_user
            ON conversations(user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS conversation_blocks (
            id              TEXT PRIMARY KEY,
            conversation_id TEXT NOT NULL REFERENCES conversations(id),
            ordinal         INTEGER NOT NULL,
            kind            TEXT NOT NULL,
            text_content    TEXT,
            tool_name       TEXT,
            tool_use_id     TEXT,
            tool_input      TEXT,
            tool_output     TEXT,
            embedding       TEXT,
            created_at      TEXT NOT NULL,
            UNIQUE(conversation_id, ordinal)
        );

        CREATE TABLE IF NOT EXISTS entities (
            id               TEXT PRIMARY KEY,
            conversation_id  TEXT,
            entity_type      TEXT NOT NULL,
            value            TEXT NOT NULL,
            normalized_value TEXT NOT NULL,
            fingerprint      TEXT NOT NULL,
            confidence       REAL NOT NULL,
            span_start       INTEGER,
            span_end         INTEGER,
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_entities_fingerprint
            ON entities(fingerprint);",
    )?;
    Ok(())
}

fn create_task_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS project_tasks (
            id                TEXT PRIMARY KEY,
            working_dir       TEXT,
            title             TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            acceptance        TEXT NOT NULL DEFAULT '[]',
            scope_paths       TEXT NOT NULL DEFAULT '[]',
            required_tools    TEXT NOT NULL DEFAULT '[]',
            task_type         TEXT NOT NULL,
            tags              TEXT NOT NULL DEFAULT '[]',
            priority          INTEGER NOT NULL DEFAULT 0,
            status            TEXT NOT NULL DEFAULT 'backlog',
            user_id           TEXT,
            claim_session_id  TEXT,
            claim_agent_id    TEXT,
            claimed_at        TEXT,
            attempt_count     INTEGER NOT NULL DEFAULT 0,
            blocked_by        TEXT NOT NULL DEFAULT '[]',
            related_task_ids  TEXT NOT NULL DEFAULT '[]',
            outcome           TEXT,
            completion_notes  TEXT,
            files_changed     TEXT NOT NULL DEFAULT '[]',
            last_error        TEXT,
            extra             TEXT NOT NULL DEFAULT '{}',
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL,
            started_at        TEXT,
            completed_at      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_user_status
            ON project_tasks(user_id, status, task_type);
        CREATE INDEX IF NOT EXISTS idx_tasks_title
            ON project_tasks(task_type, title);

        CREATE TABLE IF NOT EXISTS task_queue (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            task_type     TEXT NOT NULL,
            model_name    TEXT NOT NULL,
            content       TEXT NOT NULL,
            metadata      TEXT NOT NULL DEFAULT '{}',
            priority      INTEGER NOT NULL DEFAULT 50,
            status        TEXT NOT NULL DEFAULT 'pending',
            session_id    TEXT,
            retry_count   INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL,
            processed_at  TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_queue_claim
            ON task_queue(status, model_name, priority, created_at);",
    )?;
    Ok(())
}

fn create_memory_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS core_memory_blocks (
            id         TEXT PRIMARY KEY,
            user_id    TEXT,
            session_id TEXT,
            block_type TEXT NOT NULL,
            content    TEXT NOT NULL,
            char_limit INTEGER NOT NULL,
            version    INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_cmb_user_scope
            ON core_memory_blocks(user_id, block_type)
            WHERE session_id IS NULL AND user_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_cmb_session_scope
            ON core_memory_blocks(session_id, block_type)
            WHERE session_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS core_memory_versions (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            block_id   TEXT NOT NULL REFERENCES core_memory_blocks(id),
            version    INTEGER NOT NULL,
            content    TEXT NOT NULL,
            reason     TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(block_id, version)
        );",
    )?;
    Ok(())
}

fn create_integration_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS contradiction_reviews (
            id                 TEXT PRIMARY KEY,
            new_fact           TEXT NOT NULL,
            existing_fact_uuid TEXT NOT NULL,
            existing_fact      TEXT NOT NULL,
            similarity         REAL NOT NULL,
            reason             TEXT,
            source             TEXT,
            context            TEXT,
            entity_names       TEXT NOT NULL DEFAULT '[]',
            group_id           TEXT NOT NULL,
            status             TEXT NOT NULL DEFAULT 'pending',
            resolution         TEXT,
            resolver           TEXT,
            resolved_at        TEXT,
            created_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reviews_status
            ON contradiction_reviews(group_id, status);

        CREATE TABLE IF NOT EXISTS exploration_findings (
            id             TEXT PRIMARY KEY,
            task_id        TEXT NOT NULL,
            finding        TEXT NOT NULL,
            source_context TEXT,
            confidence     REAL NOT NULL,
            worth_sharing  INTEGER NOT NULL DEFAULT 0,
            share_message  TEXT,
            created_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS surfaced_findings (
            finding_id  TEXT NOT NULL,
            session_id  TEXT NOT NULL,
            surfaced_at TEXT NOT NULL,
            UNIQUE(finding_id, session_id)
        );",
    )?;
    Ok(())
}

fn create_ambient_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS missions (
            id             TEXT PRIMARY KEY,
            name           TEXT NOT NULL,
            prompt         TEXT NOT NULL,
            schedule       TEXT,
            sandbox_policy TEXT,
            personality    TEXT,
            model          TEXT,
            tools          TEXT NOT NULL DEFAULT '[]',
            status         TEXT NOT NULL DEFAULT 'active',
            created_at     TEXT NOT NULL,
            updated_at     TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS mission_executions (
            id                TEXT PRIMARY KEY,
            mission_id        TEXT NOT NULL REFERENCES missions(id),
            status            TEXT NOT NULL DEFAULT 'pending',
            started_at        TEXT,
            completed_at      TEXT,
            output            TEXT,
            structured_output TEXT,
            tool_count        INTEGER NOT NULL DEFAULT 0,
            error             TEXT,
            created_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_exec_mission
            ON mission_executions(mission_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS ambient_notifications (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL,
            medium          TEXT,
            target_location TEXT,
            message         TEXT NOT NULL,
            priority        TEXT NOT NULL DEFAULT 'ambient',
            reasoning       TEXT,
            status          TEXT NOT NULL DEFAULT 'pending',
            parent_id       TEXT,
            acknowledged    INTEGER NOT NULL DEFAULT 0,
            acknowledged_at TEXT,
            response_time_secs INTEGER,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notif_user
            ON ambient_notifications(user_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS notification_context (
            notification_id TEXT PRIMARY KEY,
            context         TEXT NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS medium_presence (
            medium         TEXT NOT NULL,
            user_id        TEXT NOT NULL,
            status         TEXT NOT NULL DEFAULT 'online',
            last_heartbeat TEXT NOT NULL,
            channels       TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (medium, user_id)
        );

        CREATE TABLE IF NOT EXISTS daemon_state (
            user_id                   TEXT PRIMARY KEY,
            suppressed_until          TEXT,
            last_interaction_at       TEXT,
            last_proactive_contact_at TEXT,
            last_exploration_at       TEXT,
            autonomous_work_count     INTEGER NOT NULL DEFAULT 0
        );",
    )?;
    Ok(())
}
