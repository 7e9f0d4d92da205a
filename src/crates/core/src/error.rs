//! Error type shared by the core traits and the LLM client implementation.
//!
//! The engine crate has its own, richer `EngineError` taxonomy for the
//! execution surface (§7 of the design doc). This one exists purely so
//! `ChatModel` implementations have something to return without depending on
//! the engine crate.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
