use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// The call exceeded its deadline.
    #[error("llm call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("llm transport error: {0}")]
    Transport(String),

    /// The model's output did not match the requested schema.
    #[error("llm output failed validation: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout {
                secs: crate::DEFAULT_TIMEOUT_SECS,
            }
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
