//! Errors produced by the OpenRouter client and fallback policy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("authentication failed: {0}")]
    AuthenticationError(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether a fresh attempt at the same or a fallback model is worth trying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::HttpError(_) | LlmError::RateLimitExceeded(_) | LlmError::ProviderError(_)
        )
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, LlmError::AuthenticationError(_))
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

impl From<LlmError> for engine_core::error::GraphError {
    fn from(err: LlmError) -> Self {
        engine_core::error::GraphError::Provider(err.to_string())
    }
}
