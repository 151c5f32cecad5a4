use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_store::types::ReviewStatus;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct PendingQuery {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<Value>> {
    let group = query
        .group_id
        .unwrap_or_else(|| state.config.graph.group_id.clone());
    let reviews = state.store.pending_reviews(&group, query.limit)?;
    Ok(Json(json!({"reviews": reviews})))
}

#[derive(Deserialize)]
pub struct ResolveBody {
    pub review_id: String,
    /// accepted-new | kept-old | kept-both | dismissed
    pub status: String,
    pub resolution: String,
    #[serde(default = "default_resolver")]
    pub resolver: String,
}

fn default_resolver() -> String {
    "human".to_string()
}

/// POST /reviews/resolve — accepting resolutions also commit the fact.
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveBody>,
) -> ApiResult<Json<Value>> {
    let status: ReviewStatus = body
        .status
        .parse()
        .map_err(|e: String| ApiError::InvalidInput(e))?;
    let review = state
        .checker
        .resolve_review(&body.review_id, status, &body.resolution, &body.resolver)
        .await?;
    Ok(Json(json!({"status": "ok", "review": review})))
}
