//! The HTTP error model: every component failure maps to one of six
//! observable kinds.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use vigil_store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    NotFound(String),
    Conflict(String),
    Precondition(String),
    /// Retryable: transport failures against store, graph, or model.
    Transient(String),
    /// Non-retryable; surfaced as an opaque 500.
    Fatal(String),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Precondition(_) => "precondition_failed",
            ApiError::Transient(_) => "transient",
            ApiError::Fatal(_) => "fatal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Precondition(_) => StatusCode::PRECONDITION_FAILED,
            ApiError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::InvalidInput(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::Precondition(m)
            | ApiError::Transient(m) => m,
            // Fatal details stay in the logs.
            ApiError::Fatal(_) => "internal error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Fatal(detail) = &self {
            warn!(%detail, "fatal api error");
        }
        let body = Json(json!({"error": self.message(), "kind": self.kind()}));
        (self.status(), body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            StoreError::Conflict(_) => ApiError::Conflict(e.to_string()),
            StoreError::Precondition(_) => ApiError::Precondition(e.to_string()),
            StoreError::InvalidInput(_) => ApiError::InvalidInput(e.to_string()),
            StoreError::Database(_) | StoreError::Open(_) => ApiError::Transient(e.to_string()),
            StoreError::Serialization(_) => ApiError::Fatal(e.to_string()),
        }
    }
}

impl From<vigil_ingest::IngestError> for ApiError {
    fn from(e: vigil_ingest::IngestError) -> Self {
        match e {
            vigil_ingest::IngestError::InvalidRequest(m) => ApiError::InvalidInput(m),
            vigil_ingest::IngestError::Store(inner) => inner.into(),
        }
    }
}

impl From<vigil_graph::GraphError> for ApiError {
    fn from(e: vigil_graph::GraphError) -> Self {
        ApiError::Transient(e.to_string())
    }
}

impl From<vigil_llm::LlmError> for ApiError {
    fn from(e: vigil_llm::LlmError) -> Self {
        ApiError::Transient(e.to_string())
    }
}

impl From<vigil_integrate::IntegrateError> for ApiError {
    fn from(e: vigil_integrate::IntegrateError) -> Self {
        match e {
            vigil_integrate::IntegrateError::Store(inner) => inner.into(),
            vigil_integrate::IntegrateError::Graph(inner) => inner.into(),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
