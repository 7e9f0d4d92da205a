//! The shape a node's output takes in the results map (§3, §9 "tagged
//! results without subtyping"): plain text, a signal-bearing tagged record
//! used by conditional/loop routing, or a structured JSON value used by the
//! map/reduce and multi-agent node kinds.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone)]
pub struct TaggedResult {
    pub signal: String,
    pub data: String,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub enum NodeResult {
    Plain(String),
    Tagged(TaggedResult),
    /// Always a JSON object. Producers that want their output usable as
    /// plain text downstream (splitter, reduce, moa, debate, voting) include
    /// a `"text"` field holding that projection.
    Structured(Value),
}

impl NodeResult {
    pub fn tagged(signal: impl Into<String>, data: impl Into<String>) -> Self {
        NodeResult::Tagged(TaggedResult { signal: signal.into(), data: data.into(), extra: Map::new() })
    }

    pub fn structured(text: impl Into<String>, mut value: Map<String, Value>) -> Self {
        value.insert("text".to_string(), Value::String(text.into()));
        NodeResult::Structured(Value::Object(value))
    }

    /// The textual projection used for downstream concatenation and for
    /// `{signal, data}` branch gating.
    pub fn text(&self) -> String {
        match self {
            NodeResult::Plain(s) => s.clone(),
            NodeResult::Tagged(t) => t.data.clone(),
            NodeResult::Structured(v) => v.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
        }
    }

    /// The `node_finish` payload projection: tagged results surface only
    /// their signal, everything else surfaces in full.
    pub fn ui_projection(&self) -> Value {
        match self {
            NodeResult::Plain(s) => json!(s),
            NodeResult::Tagged(t) => json!(t.signal),
            NodeResult::Structured(v) => v.clone(),
        }
    }

    /// Structural field lookup used by handlers that branch on result shape
    /// (e.g. reduce looking for `chunks`, moa-aggregator for `proposer_outputs`).
    pub fn field(&self, key: &str) -> Option<&Value> {
        match self {
            NodeResult::Structured(Value::Object(map)) => map.get(key),
            _ => None,
        }
    }
}
