//! POST /conversation/capture — the hot ingestion path.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_ingest::CaptureRequest;
use vigil_store::types::Role;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct CaptureBody {
    pub session_id: String,
    pub prompt: String,
    /// "user" | "assistant" | "system"; defaults to user.
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_command: bool,
    #[serde(default)]
    pub speaker_name: Option<String>,
}

pub async fn capture(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CaptureBody>,
) -> ApiResult<Json<Value>> {
    let role: Role = match body.message_type.as_deref() {
        None => Role::User,
        Some(raw) => raw
            .parse()
            .map_err(|e: String| ApiError::InvalidInput(e))?,
    };
    state
        .ingestor
        .capture(CaptureRequest {
            session_id: body.session_id,
            role,
            prompt: body.prompt,
            medium: body.medium,
            user_id: body.user_id,
            working_dir: body.project_path,
            personality: body.personality,
            speaker_name: body.speaker_name,
            is_command: body.is_command,
        })
        .await?;
    Ok(Json(json!({"status": "stored"})))
}

/// GET /conversations/last_dm/{user_id}
pub async fn last_dm(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    match state.store.last_dm_for_user(&user_id)? {
        Some(conversation) => Ok(Json(json!({"found": true, "conversation": conversation}))),
        None => Ok(Json(json!({"found": false}))),
    }
}
