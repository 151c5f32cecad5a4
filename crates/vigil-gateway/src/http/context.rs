//! Context build/get endpoints.
//!
//! Build degrades instead of failing: frontends always get HTTP 200 with a
//! status string, so a dead graph never takes the conversation down.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_ingest::BuildStatus;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct BuildBody {
    pub session_id: String,
    pub current_prompt: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default = "default_depth")]
    pub context_depth: usize,
}

fn default_depth() -> usize {
    1
}

pub async fn build(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BuildBody>,
) -> Json<Value> {
    let user = body
        .user_id
        .clone()
        .unwrap_or_else(|| state.default_user().to_string());
    let built = state
        .context
        .build(
            &body.session_id,
            Some(&user),
            &body.current_prompt,
            body.context_depth,
        )
        .await;
    let response = match built.status {
        BuildStatus::Ok => json!({"status": "ok", "context": built.context}),
        BuildStatus::Unavailable => json!({"status": "unavailable", "context": ""}),
        BuildStatus::Error(e) => json!({"status": "error", "context": "", "error": e}),
    };
    Json(response)
}

#[derive(Deserialize)]
pub struct GetBody {
    pub session_id: String,
    #[serde(default)]
    pub max_age_minutes: Option<i64>,
}

pub async fn get_cached(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GetBody>,
) -> ApiResult<Json<Value>> {
    let max_age = body
        .max_age_minutes
        .unwrap_or(state.config.context.max_age_minutes);
    match state.store.get_context(&body.session_id, max_age)? {
        Some(entry) => Ok(Json(json!({"found": true, "context": entry.context}))),
        None => Ok(Json(json!({"found": false, "context": ""}))),
    }
}

#[derive(Deserialize)]
pub struct SessionStartBody {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
}

pub async fn build_session_start(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SessionStartBody>,
) -> Json<Value> {
    let user = body
        .user_id
        .clone()
        .unwrap_or_else(|| state.default_user().to_string());
    let (built, session_type, project_name) = state
        .context
        .build_session_start(
            &body.session_id,
            Some(&user),
            body.working_dir.as_deref(),
            body.medium.as_deref(),
        )
        .await;
    Json(json!({
        "status": "ok",
        "context": built.context,
        "session_type": session_type,
        "project_name": project_name,
    }))
}
