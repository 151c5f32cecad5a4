use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use vigil_graph::SearchParams;

use crate::app::AppState;
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct HybridBody {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub rerank_method: Option<String>,
    #[serde(default)]
    pub entity_values: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_limit() -> usize {
    20
}

/// POST /search/hybrid — forwarded to the graph adapter.
pub async fn hybrid(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HybridBody>,
) -> ApiResult<Json<Value>> {
    let results = state
        .graph
        .search(&SearchParams {
            query: body.query,
            group_id: state.config.graph.group_id.clone(),
            limit: body.limit,
            rerank_method: body.rerank_method,
            entity_values: body.entity_values,
            since: body.since,
            ..Default::default()
        })
        .await?;
    Ok(Json(json!({
        "nodes": results.nodes,
        "edges": results.edges,
        "facts": results.facts,
    })))
}

#[derive(Deserialize)]
pub struct EntitiesQuery {
    #[serde(default = "default_entities_limit")]
    pub limit: usize,
    #[serde(default)]
    pub query: Option<String>,
}

fn default_entities_limit() -> usize {
    50
}

/// GET /kg/entities — top graph entities, optionally filtered by a query.
pub async fn kg_entities(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EntitiesQuery>,
) -> ApiResult<Json<Value>> {
    let nodes = state
        .graph
        .hybrid_node_search(
            query.query.as_deref().unwrap_or(""),
            &state.config.graph.group_id,
            query.limit,
        )
        .await?;
    Ok(Json(json!({"entities": nodes})))
}
