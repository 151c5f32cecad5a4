use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrateError {
    #[error("store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("graph error: {0}")]
    Graph(#[from] vigil_graph::GraphError),
}

pub type Result<T> = std::result::Result<T, IntegrateError>;
