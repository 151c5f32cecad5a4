use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("invalid capture request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
