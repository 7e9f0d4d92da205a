//! Crate-wide error taxonomy.
//!
//! Node handlers return `Result<NodeOutcome, EngineError>`; the scheduler is
//! the single place that turns an `Err` into `failed`-set membership plus a
//! `node_error` event. Only graph validation (before a run starts) and a
//! fatal internal break surface as a `Result::Err` out of the session loop —
//! everything else becomes an event before the run loop sees it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Structural(String),

    #[error("node {node_id} failed: {source}")]
    Node {
        node_id: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("system error: {0}")]
    System(String),
}

impl From<engine_core::GraphError> for EngineError {
    fn from(err: engine_core::GraphError) -> Self {
        match err {
            engine_core::GraphError::Validation(msg) => EngineError::Validation(msg),
            engine_core::GraphError::Provider(msg) => EngineError::Provider(msg),
            engine_core::GraphError::Serialization(e) => EngineError::System(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl EngineError {
    pub fn node(node_id: impl Into<String>, source: EngineError) -> Self {
        EngineError::Node { node_id: node_id.into(), source: Box::new(source) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_variant_has_a_display_message() {
        let variants: Vec<EngineError> = vec![
            EngineError::Validation("bad graph".into()),
            EngineError::Structural("Cycle detected or empty graph".into()),
            EngineError::node("n1", EngineError::Provider("timeout".into())),
            EngineError::Provider("503".into()),
            EngineError::System("panic recovered".into()),
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }

    #[test]
    fn structural_message_matches_spec_wording() {
        let err = EngineError::Structural("Cycle detected or empty graph".into());
        assert_eq!(err.to_string(), "Cycle detected or empty graph");
    }
}
