use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmbientError {
    #[error("store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("graph error: {0}")]
    Graph(#[from] vigil_graph::GraphError),

    #[error("llm error: {0}")]
    Llm(#[from] vigil_llm::LlmError),

    #[error("integration error: {0}")]
    Integrate(#[from] vigil_integrate::IntegrateError),

    #[error("kickoff decision malformed: {0}")]
    BadDecision(String),
}

pub type Result<T> = std::result::Result<T, AmbientError>;
