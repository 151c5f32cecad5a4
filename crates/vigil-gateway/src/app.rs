use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use vigil_ambient::{ActivityTracker, TaskSource};
use vigil_core::config::VigilConfig;
use vigil_graph::GraphAdapter;
use vigil_ingest::{ContextBuilder, EmotionBuffer, Ingestor};
use vigil_integrate::FactChecker;
use vigil_llm::LlmAdapter;
use vigil_store::Store;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: VigilConfig,
    pub store: Arc<Store>,
    pub graph: Arc<dyn GraphAdapter>,
    pub llm: Arc<dyn LlmAdapter>,
    pub ingestor: Ingestor,
    pub context: ContextBuilder,
    pub emotions: Arc<EmotionBuffer>,
    pub tracker: Arc<ActivityTracker>,
    pub tasks: Arc<dyn TaskSource>,
    pub checker: Arc<FactChecker>,
}

impl AppState {
    /// The deployment's single user, used when a request omits user_id.
    pub fn default_user(&self) -> &str {
        &self.config.ambient.user_id
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health))
        .route(
            "/conversation/capture",
            post(crate::http::conversation::capture),
        )
        .route(
            "/conversations/last_dm/{user_id}",
            get(crate::http::conversation::last_dm),
        )
        .route("/context/build", post(crate::http::context::build))
        .route("/context/get", post(crate::http::context::get_cached))
        .route(
            "/context/build_session_start",
            post(crate::http::context::build_session_start),
        )
        .route("/sessions/create", post(crate::http::sessions::create))
        .route(
            "/sessions/find_or_create",
            post(crate::http::sessions::find_or_create),
        )
        .route("/sessions/end", post(crate::http::sessions::end))
        .route(
            "/sessions/{id}/message",
            post(crate::http::sessions::message),
        )
        .route(
            "/sessions/{id}/agent_session",
            post(crate::http::sessions::agent_session),
        )
        .route("/sessions/{id}/history", get(crate::http::sessions::history))
        .route("/sessions/context", get(crate::http::sessions::context))
        .route("/status/get", post(crate::http::status::get_status))
        .route("/activity/state", get(crate::http::status::activity_state))
        .route("/emotion/summary", get(crate::http::status::emotion_summary))
        .route(
            "/taskwarrior/tasks",
            get(crate::http::status::taskwarrior_tasks),
        )
        .route("/search/hybrid", post(crate::http::search::hybrid))
        .route("/kg/entities", get(crate::http::search::kg_entities))
        .route("/memory/core/edit", post(crate::http::memory::edit))
        .route("/memory/core/history", get(crate::http::memory::history))
        .route("/memory/core/rollback", post(crate::http::memory::rollback))
        .route("/recall/search", get(crate::http::recall::search))
        .route(
            "/recall/findings/surface",
            post(crate::http::recall::surface_finding),
        )
        .route(
            "/notifications/recent_unacknowledged",
            post(crate::http::notifications::recent_unacknowledged),
        )
        .route(
            "/notifications/ack",
            post(crate::http::notifications::acknowledge),
        )
        .route("/presence/heartbeat", post(crate::http::presence::heartbeat))
        .route("/reviews/pending", get(crate::http::reviews::pending))
        .route("/reviews/resolve", post(crate::http::reviews::resolve))
        .route(
            "/missions",
            get(crate::http::missions::list).post(crate::http::missions::create),
        )
        .route(
            "/missions/{id}",
            get(crate::http::missions::get_one)
                .put(crate::http::missions::update_status)
                .delete(crate::http::missions::delete),
        )
        .route(
            "/missions/{id}/executions",
            get(crate::http::missions::executions),
        )
        .route("/missions/{id}/run", post(crate::http::missions::run_once))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
