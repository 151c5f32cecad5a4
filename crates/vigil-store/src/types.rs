use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Kind of a conversation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    ToolUse,
    ToolResult,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BlockKind::Text => "text",
            BlockKind::ToolUse => "tool_use",
            BlockKind::ToolResult => "tool_result",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BlockKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(BlockKind::Text),
            "tool_use" => Ok(BlockKind::ToolUse),
            "tool_result" => Ok(BlockKind::ToolResult),
            other => Err(format!("unknown block kind: {other}")),
        }
    }
}

/// Lifecycle of a project task (curiosity backlog included).
///
/// `Done` and `Cancelled` are terminal. A task is *pending* in the backlog
/// sense when it is `Backlog`, `Ready`, or `Blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Ready,
    Blocked,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    pub fn is_pending(self) -> bool {
        matches!(
            self,
            TaskStatus::Backlog | TaskStatus::Ready | TaskStatus::Blocked
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Ready => "ready",
            TaskStatus::Blocked => "blocked",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(TaskStatus::Backlog),
            "ready" => Ok(TaskStatus::Ready),
            "blocked" => Ok(TaskStatus::Blocked),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Lifecycle of a short-lived model job in the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(format!("unknown queue status: {other}")),
        }
    }
}

/// Resolution state of a contradiction review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewStatus {
    Pending,
    AcceptedNew,
    KeptOld,
    KeptBoth,
    Dismissed,
}

impl ReviewStatus {
    /// True when resolving to this status commits the new fact to the graph.
    pub fn commits_fact(self) -> bool {
        matches!(self, ReviewStatus::AcceptedNew | ReviewStatus::KeptBoth)
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::AcceptedNew => "accepted-new",
            ReviewStatus::KeptOld => "kept-old",
            ReviewStatus::KeptBoth => "kept-both",
            ReviewStatus::Dismissed => "dismissed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReviewStatus::Pending),
            "accepted-new" => Ok(ReviewStatus::AcceptedNew),
            "kept-old" => Ok(ReviewStatus::KeptOld),
            "kept-both" => Ok(ReviewStatus::KeptBoth),
            "dismissed" => Ok(ReviewStatus::Dismissed),
            other => Err(format!("unknown review status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Active,
    Paused,
    Archived,
    RunningOnce,
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MissionStatus::Active => "active",
            MissionStatus::Paused => "paused",
            MissionStatus::Archived => "archived",
            MissionStatus::RunningOnce => "running_once",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MissionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(MissionStatus::Active),
            "paused" => Ok(MissionStatus::Paused),
            "archived" => Ok(MissionStatus::Archived),
            "running_once" => Ok(MissionStatus::RunningOnce),
            other => Err(format!("unknown mission status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Urgency tier for a proactive notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Silent,
    Ambient,
    Conversation,
    Urgent,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationPriority::Silent => "silent",
            NotificationPriority::Ambient => "ambient",
            NotificationPriority::Conversation => "conversation",
            NotificationPriority::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "silent" => Ok(NotificationPriority::Silent),
            "ambient" => Ok(NotificationPriority::Ambient),
            "conversation" => Ok(NotificationPriority::Conversation),
            "urgent" => Ok(NotificationPriority::Urgent),
            other => Err(format!("unknown notification priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Delivered,
    Failed,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "delivered" => Ok(NotificationStatus::Delivered),
            "failed" => Ok(NotificationStatus::Failed),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A long-lived conversation container.
///
/// Lazily created on first message; `end_time` set when the session is idle
/// or explicitly ended. Never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub working_dir: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub last_activity: String,
    /// Prior session this one continues. Stored as an id only; traversal is
    /// an explicit bounded walk, never a held reference.
    pub continued_from: Option<String>,
    pub medium: Option<String>,
    pub user_id: Option<String>,
    pub personality: Option<String>,
    pub sandbox_policy: Option<String>,
    pub mission_id: Option<String>,
    pub agent_session_id: Option<String>,
    pub summary: Option<String>,
    pub summary_updated_at: Option<String>,
}

/// A single message within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub prompt: String,
    pub medium: Option<String>,
    pub user_id: Option<String>,
    pub latency_ms: Option<i64>,
    pub tool_names: Option<Vec<String>>,
    pub created_at: String,
}

/// One ordinal unit of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBlock {
    pub id: String,
    pub conversation_id: String,
    pub ordinal: i64,
    pub kind: BlockKind,
    pub text_content: Option<String>,
    pub tool_name: Option<String>,
    pub tool_use_id: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_output: Option<Value>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
}

/// Append-only audit record of an extracted entity reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    pub conversation_id: Option<String>,
    pub entity_type: String,
    pub value: String,
    pub normalized_value: String,
    pub fingerprint: String,
    pub confidence: f64,
    pub span_start: Option<i64>,
    pub span_end: Option<i64>,
    pub created_at: String,
}

/// The unit of the work queue and the curiosity backlog.
///
/// `priority` is descending here: larger = more important. The short-lived
/// model-job queue uses the opposite convention; the two are deliberately
/// not unified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTask {
    pub id: String,
    pub working_dir: Option<String>,
    pub title: String,
    pub description: String,
    pub acceptance: Vec<String>,
    pub scope_paths: Vec<String>,
    pub required_tools: Vec<String>,
    pub task_type: String,
    pub tags: Vec<String>,
    pub priority: i64,
    pub status: TaskStatus,
    pub user_id: Option<String>,
    pub claim_session_id: Option<String>,
    pub claim_agent_id: Option<String>,
    pub claimed_at: Option<String>,
    pub attempt_count: i64,
    pub blocked_by: Vec<String>,
    pub related_task_ids: Vec<String>,
    pub outcome: Option<String>,
    pub completion_notes: Option<String>,
    pub files_changed: Vec<String>,
    pub last_error: Option<String>,
    pub extra: Value,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl ProjectTask {
    /// A task is claimed iff both claim ids and the claim timestamp are set
    /// and the status still allows work.
    pub fn is_claimed(&self) -> bool {
        self.claim_session_id.is_some()
            && self.claim_agent_id.is_some()
            && self.claimed_at.is_some()
            && matches!(self.status, TaskStatus::Ready | TaskStatus::InProgress)
    }
}

/// A short-lived model job. `priority` is ascending: smaller = higher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTask {
    pub id: i64,
    pub task_type: String,
    pub model_name: String,
    pub content: String,
    pub metadata: Value,
    pub priority: i64,
    pub status: QueueStatus,
    pub session_id: Option<String>,
    pub retry_count: i64,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub processed_at: Option<String>,
}

/// A durable, versioned slot of agent-visible memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreMemoryBlock {
    pub id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub block_type: String,
    pub content: String,
    pub char_limit: i64,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreMemoryVersion {
    pub block_id: String,
    pub version: i64,
    pub content: String,
    pub reason: Option<String>,
    pub created_at: String,
}

/// A pending disagreement between a new fact and an existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionReview {
    pub id: String,
    pub new_fact: String,
    pub existing_fact_uuid: String,
    pub existing_fact: String,
    pub similarity: f64,
    pub reason: Option<String>,
    pub source: Option<String>,
    pub context: Option<String>,
    pub entity_names: Vec<String>,
    pub group_id: String,
    pub status: ReviewStatus,
    pub resolution: Option<String>,
    pub resolver: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

/// A reusable proactive intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub schedule: Option<String>,
    pub sandbox_policy: Option<String>,
    pub personality: Option<String>,
    pub model: Option<String>,
    pub tools: Vec<String>,
    pub status: MissionStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// One attempt at running a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionExecution {
    pub id: String,
    pub mission_id: String,
    pub status: ExecutionStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub output: Option<String>,
    pub structured_output: Option<Value>,
    pub tool_count: i64,
    pub error: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbientNotification {
    pub id: String,
    pub user_id: String,
    pub medium: Option<String>,
    pub target_location: Option<String>,
    pub message: String,
    pub priority: NotificationPriority,
    pub reasoning: Option<String>,
    pub status: NotificationStatus,
    /// Escalation chain parent, id only.
    pub parent_id: Option<String>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<String>,
    pub response_time_secs: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Heartbeat-derived presence of a user on one medium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediumPresence {
    pub medium: String,
    pub user_id: String,
    pub status: String,
    pub last_heartbeat: String,
    pub channels: Vec<String>,
}

/// Per-user daemon bookkeeping. Created lazily on first reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonState {
    pub user_id: String,
    pub suppressed_until: Option<String>,
    pub last_interaction_at: Option<String>,
    pub last_proactive_contact_at: Option<String>,
    pub last_exploration_at: Option<String>,
    pub autonomous_work_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationFinding {
    pub id: String,
    pub task_id: String,
    pub finding: String,
    pub source_context: Option<String>,
    pub confidence: f64,
    pub worth_sharing: bool,
    pub share_message: Option<String>,
    pub created_at: String,
}

/// Per-session materialized context blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCacheEntry {
    pub session_id: String,
    pub context: String,
    pub metadata: Value,
    pub updated_at: String,
}

/// One rolling summary-of-summaries row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryContext {
    pub id: i64,
    pub summary: String,
    pub session_ids: Vec<String>,
    pub created_at: String,
}

// ---------------------------------------------------------------------------
// Helpers shared by the row mappers
// ---------------------------------------------------------------------------

/// Parse a JSON array column into a Vec<String>, tolerating nulls.
pub(crate) fn string_vec(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Parse a JSON object column, defaulting to an empty object.
pub(crate) fn json_object(raw: Option<String>) -> Value {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}
