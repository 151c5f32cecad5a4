//! External task-list integration (taskwarrior or compatible).
//!
//! Consulted for the context fingerprint and the "overdue tasks" override;
//! deployments without it use [`NoTasks`].

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ExternalTask {
    pub id: String,
    pub description: String,
    pub status: String,
    pub due: Option<String>,
    pub urgency: Option<f64>,
}

#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Open tasks, optionally filtered by status.
    async fn tasks(&self, status: Option<&str>) -> Vec<ExternalTask>;

    /// Ids of tasks past their due date.
    async fn overdue_ids(&self) -> Vec<String>;
}

pub struct NoTasks;

#[async_trait]
impl TaskSource for NoTasks {
    async fn tasks(&self, _status: Option<&str>) -> Vec<ExternalTask> {
        Vec::new()
    }

    async fn overdue_ids(&self) -> Vec<String> {
        Vec::new()
    }
}
