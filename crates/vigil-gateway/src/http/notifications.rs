use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct UnackedBody {
    pub user_id: String,
    /// RFC3339 lower bound.
    pub since: String,
}

pub async fn recent_unacknowledged(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UnackedBody>,
) -> ApiResult<Json<Value>> {
    let notifications = state
        .store
        .unacknowledged_since(&body.user_id, &body.since)?;
    Ok(Json(json!({"notifications": notifications})))
}

#[derive(Deserialize)]
pub struct AckBody {
    pub notification_id: String,
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AckBody>,
) -> ApiResult<Json<Value>> {
    state.store.acknowledge_notification(&body.notification_id)?;
    Ok(Json(json!({"status": "ok"})))
}
