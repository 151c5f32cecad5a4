use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_ingest::CaptureRequest;
use vigil_store::sessions::NewSession;
use vigil_store::types::Role;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct SessionBody {
    pub session_id: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub continued_from: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub sandbox_policy: Option<String>,
}

impl SessionBody {
    fn into_new(self) -> NewSession {
        NewSession {
            id: self.session_id,
            working_dir: self.working_dir,
            continued_from: self.continued_from,
            medium: self.medium,
            user_id: self.user_id,
            personality: self.personality,
            sandbox_policy: self.sandbox_policy,
            mission_id: None,
        }
    }
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SessionBody>,
) -> ApiResult<Json<Value>> {
    let session = state.store.create_session(&body.into_new())?;
    Ok(Json(json!({"status": "created", "session": session})))
}

pub async fn find_or_create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SessionBody>,
) -> ApiResult<Json<Value>> {
    let session = state.store.find_or_create_session(&body.into_new())?;
    Ok(Json(json!({"status": "ok", "session": session})))
}

#[derive(Deserialize)]
pub struct EndBody {
    pub session_id: String,
}

pub async fn end(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EndBody>,
) -> ApiResult<Json<Value>> {
    state.store.end_session(&body.session_id)?;
    Ok(Json(json!({"status": "ended"})))
}

#[derive(Deserialize)]
pub struct MessageBody {
    pub prompt: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_command: bool,
}

/// POST /sessions/{id}/message — capture addressed by path.
pub async fn message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<MessageBody>,
) -> ApiResult<Json<Value>> {
    let role: Role = match body.role.as_deref() {
        None => Role::User,
        Some(raw) => raw
            .parse()
            .map_err(|e: String| ApiError::InvalidInput(e))?,
    };
    let conversation_id = state
        .ingestor
        .capture(CaptureRequest {
            session_id,
            role,
            prompt: body.prompt,
            medium: body.medium,
            user_id: body.user_id,
            is_command: body.is_command,
            ..Default::default()
        })
        .await?;
    Ok(Json(json!({"status": "stored", "conversation_id": conversation_id})))
}

#[derive(Deserialize)]
pub struct AgentSessionBody {
    pub agent_session_id: String,
}

/// POST /sessions/{id}/agent_session — record the backing agent session.
pub async fn agent_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(body): Json<AgentSessionBody>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .set_agent_session(&session_id, &body.agent_session_id)?;
    Ok(Json(json!({"status": "ok"})))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    50
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    // 404 for sessions that never existed, empty history otherwise.
    state.store.get_session(&session_id)?;
    let messages = state.store.last_messages(&session_id, query.limit)?;
    Ok(Json(json!({"messages": messages})))
}

#[derive(Deserialize)]
pub struct ContextQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_sessions_limit")]
    pub limit: usize,
}

fn default_sessions_limit() -> usize {
    10
}

/// GET /sessions/context — recent sessions with their summaries.
pub async fn context(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContextQuery>,
) -> ApiResult<Json<Value>> {
    let sessions = state
        .store
        .recent_sessions(query.user_id.as_deref(), query.limit)?;
    let rolling = state.store.latest_summary_context()?;
    Ok(Json(json!({
        "sessions": sessions,
        "rolling_summary": rolling.map(|r| r.summary),
    })))
}
