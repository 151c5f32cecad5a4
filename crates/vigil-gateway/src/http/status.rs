use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_ambient::derive_state;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize, Default)]
pub struct StatusBody {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /status/get — daemon liveness, queue stats, derived ambient state.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StatusBody>>,
) -> ApiResult<Json<Value>> {
    let user = body
        .and_then(|Json(b)| b.user_id)
        .unwrap_or_else(|| state.default_user().to_string());
    let queue = state.store.queue_stats()?;
    let daemon = state.store.daemon_state(&user)?;
    let active = state
        .store
        .active_session_count(&user, state.config.ambient.active_session_window_minutes)?;
    let derived = derive_state(
        &daemon,
        active,
        chrono::Utc::now(),
        state.config.ambient.idle_threshold_minutes,
    );
    Ok(Json(json!({
        "daemon": "running",
        "queue": queue,
        "state": derived,
        "active_sessions": active,
        "autonomous_work_count": daemon.autonomous_work_count,
        "pending_curiosity": state.store.pending_curiosity_count(&user)?,
    })))
}

/// GET /activity/state — the current streak.
pub async fn activity_state(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.tracker.snapshot() {
        Some(streak) => Json(json!({
            "active": true,
            "app": streak.sample.app,
            "title": streak.sample.title,
            "accumulated_secs": streak.accumulated_secs,
        })),
        None => Json(json!({"active": false})),
    }
}

/// GET /emotion/summary
pub async fn emotion_summary(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(serde_json::to_value(state.emotions.summary()).unwrap_or(Value::Null))
}

#[derive(Deserialize)]
pub struct TaskQuery {
    #[serde(default)]
    pub status: Option<String>,
}

/// GET /taskwarrior/tasks
pub async fn taskwarrior_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskQuery>,
) -> Json<Value> {
    let tasks = state.tasks.tasks(query.status.as_deref()).await;
    Json(json!({"tasks": tasks}))
}
