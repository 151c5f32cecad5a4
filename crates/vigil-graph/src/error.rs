use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph service is unreachable or reported itself down.
    #[error("graph unavailable: {0}")]
    Unavailable(String),

    #[error("graph transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("graph response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
