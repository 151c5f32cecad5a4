use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct HeartbeatBody {
    pub medium: String,
    pub user_id: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_status() -> String {
    "online".to_string()
}

/// POST /presence/heartbeat — frontends call at least every 30 s; a medium
/// is considered online for 60 s after its last beat.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HeartbeatBody>,
) -> ApiResult<Json<Value>> {
    state
        .store
        .heartbeat(&body.medium, &body.user_id, &body.status, &body.channels)?;
    Ok(Json(json!({"status": "ok"})))
}
