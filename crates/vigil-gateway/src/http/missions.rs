use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_store::missions::NewMission;
use vigil_store::types::MissionStatus;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct CreateBody {
    pub name: String,
    pub prompt: String,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub sandbox_policy: Option<String>,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tools: Vec<String>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBody>,
) -> ApiResult<Json<Value>> {
    if body.name.trim().is_empty() || body.prompt.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "mission name and prompt are required".into(),
        ));
    }
    let mission = state.store.create_mission(&NewMission {
        name: body.name,
        prompt: body.prompt,
        schedule: body.schedule,
        sandbox_policy: body.sandbox_policy,
        personality: body.personality,
        model: body.model,
        tools: body.tools,
    })?;
    Ok(Json(json!({"status": "created", "mission": mission})))
}

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let missions = state.store.list_missions()?;
    Ok(Json(json!({"missions": missions})))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mission = state.store.get_mission(&id)?;
    Ok(Json(json!({"mission": mission})))
}

#[derive(Deserialize)]
pub struct UpdateBody {
    /// active | paused | archived | running_once
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> ApiResult<Json<Value>> {
    let status: MissionStatus = body
        .status
        .parse()
        .map_err(|e: String| ApiError::InvalidInput(e))?;
    state.store.set_mission_status(&id, status)?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.store.delete_mission(&id)?;
    Ok(Json(json!({"status": "deleted"})))
}

#[derive(Deserialize)]
pub struct ExecutionsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ExecutionsQuery>,
) -> ApiResult<Json<Value>> {
    state.store.get_mission(&id)?;
    let executions = state.store.executions_for_mission(&id, query.limit)?;
    Ok(Json(json!({"executions": executions})))
}

/// POST /missions/{id}/run — mark run-once and enqueue an execution.
pub async fn run_once(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .set_mission_status(&id, MissionStatus::RunningOnce)?;
    let execution = state.store.create_execution(&id)?;
    Ok(Json(json!({"status": "queued", "execution": execution})))
}
