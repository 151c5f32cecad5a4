//! Core-memory endpoints: edit, history, rollback.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_store::memory::BlockScope;

use crate::app::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct ScopeFields {
    /// "user" or "session".
    pub scope: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ScopeFields {
    fn resolve(&self, state: &AppState) -> Result<BlockScope, ApiError> {
        match self.scope.as_str() {
            "user" => Ok(BlockScope::User(
                self.user_id
                    .clone()
                    .unwrap_or_else(|| state.default_user().to_string()),
            )),
            "session" => self
                .session_id
                .clone()
                .map(BlockScope::Session)
                .ok_or_else(|| {
                    ApiError::InvalidInput("session scope requires session_id".into())
                }),
            other => Err(ApiError::InvalidInput(format!("unknown scope: {other}"))),
        }
    }
}

#[derive(Deserialize)]
pub struct EditBody {
    pub block_type: String,
    pub content: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub char_limit: Option<i64>,
    #[serde(flatten)]
    pub scope: ScopeFields,
}

pub async fn edit(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EditBody>,
) -> ApiResult<Json<Value>> {
    let scope = body.scope.resolve(&state)?;
    let block = state.store.edit_core_memory(
        &scope,
        &body.block_type,
        &body.content,
        body.reason.as_deref(),
        body.char_limit,
    )?;
    Ok(Json(json!({"status": "ok", "block": block})))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub block_type: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub scope: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_limit() -> i64 {
    20
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let scope = ScopeFields {
        scope: query.scope.clone(),
        user_id: query.user_id.clone(),
        session_id: query.session_id.clone(),
    }
    .resolve(&state)?;
    let versions = state
        .store
        .core_memory_history(&scope, &query.block_type, query.limit)?;
    Ok(Json(json!({"versions": versions})))
}

#[derive(Deserialize)]
pub struct RollbackBody {
    pub block_type: String,
    pub target_version: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub scope: ScopeFields,
}

pub async fn rollback(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RollbackBody>,
) -> ApiResult<Json<Value>> {
    let scope = body.scope.resolve(&state)?;
    let block = state.store.rollback_core_memory(
        &scope,
        &body.block_type,
        body.target_version,
        body.reason.as_deref(),
    )?;
    Ok(Json(json!({"status": "ok", "block": block})))
}
