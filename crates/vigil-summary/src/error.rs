use thiserror::Error;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("store error: {0}")]
    Store(#[from] vigil_store::StoreError),

    #[error("llm error: {0}")]
    Llm(#[from] vigil_llm::LlmError),
}

pub type Result<T> = std::result::Result<T, SummaryError>;
