use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness plus downstream reachability.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let graph_up = state.graph.available().await;
    Json(json!({
        "status": "ok",
        "graph": if graph_up { "up" } else { "down" },
    }))
}
