use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct RecallQuery {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_days")]
    pub days_back: i64,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_limit() -> i64 {
    20
}
fn default_days() -> i64 {
    30
}

/// GET /recall/search — substring recall over stored conversations.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecallQuery>,
) -> ApiResult<Json<Value>> {
    let hits = state.store.recall_search(
        &query.query,
        query.limit,
        query.days_back,
        query.session_id.as_deref(),
        query.user_id.as_deref(),
    )?;
    Ok(Json(json!({"results": hits})))
}

#[derive(Deserialize)]
pub struct SurfaceBody {
    pub finding_id: String,
    pub session_id: String,
}

/// POST /recall/findings/surface — record a finding shown in a session.
pub async fn surface_finding(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SurfaceBody>,
) -> ApiResult<Json<Value>> {
    let surfaced = state
        .store
        .surface_finding(&body.finding_id, &body.session_id)?;
    Ok(Json(json!({"surfaced": surfaced})))
}
