//! `vigil-store` — the relational store behind the Vigil daemon.
//!
//! One SQLite database holds sessions, conversations with ordinal blocks,
//! extracted entities, the curiosity backlog (project tasks), the model job
//! queue, versioned core-memory blocks, contradiction reviews, missions,
//! ambient notifications, medium presence, per-user daemon state, and
//! exploration findings.
//!
//! All invariant-bearing multi-row mutations (backlog bounds, version
//! monotonicity, queue claim) run inside a single immediate transaction
//! under the connection mutex, so concurrent callers never interleave on
//! those paths.

pub mod context;
pub mod conversations;
pub mod daemon;
pub mod db;
pub mod entities;
pub mod error;
pub mod findings;
pub mod memory;
pub mod missions;
pub mod notifications;
pub mod presence;
pub mod queue;
pub mod reviews;
pub mod sessions;
pub mod tasks;
pub mod types;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

pub use error::{Result, StoreError};

/// Shared handle to the Vigil database.
///
/// Thread-safe: every operation locks the inner connection. Subsystems share
/// one `Arc<Store>`; SQLite's single-writer model plus the mutex gives the
/// row-lock-and-skip semantics the claim paths rely on.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and initialise the
    /// schema. The parent directory is created when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(dir) = path.as_ref().parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::Open(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(StoreError::from)?;
        // journal_mode returns the resulting mode as a row.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        db::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }
}

/// RFC3339 UTC timestamp for the current instant.
///
/// Stored timestamps share one format so lexicographic comparison in SQL
/// matches chronological order.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
