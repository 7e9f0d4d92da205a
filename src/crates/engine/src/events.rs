//! The tagged event schema (§6) and the single-writer sink every node
//! handler and the scheduler funnel their progress through.
//!
//! A single writer task owns the client channel; handlers hold a clone of
//! the [`EventSink`] and never touch the socket directly. This keeps "no
//! interleaving within a single event" trivially true and decouples handler
//! pacing from network backpressure.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "execution_start")]
    ExecutionStart,

    #[serde(rename = "execution_complete")]
    ExecutionComplete { stats: ExecutionStats },

    #[serde(rename = "execution_error")]
    ExecutionError { node_id: String, error: String },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "node_start")]
    NodeStart { node_id: String },

    #[serde(rename = "node_finish")]
    NodeFinish { node_id: String, result: Value },

    #[serde(rename = "node_error")]
    NodeError { node_id: String, error: String },

    #[serde(rename = "node_skipped")]
    NodeSkipped { node_id: String },

    #[serde(rename = "token_stream")]
    TokenStream {
        node_id: String,
        token: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model_used: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_fallback: Option<bool>,
    },

    #[serde(rename = "node_usage")]
    NodeUsage { node_id: String, usage: Value },

    #[serde(rename = "node_progress")]
    NodeProgress { node_id: String, current: usize, total: usize, message: String },

    #[serde(rename = "model_fallback")]
    ModelFallback { node_id: String, original_model: String, fallback_model: String, attempt: usize, reason: String },
}

#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct ExecutionStats {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

/// A cheaply-cloneable handle onto the run's single writer task. Dropping
/// every clone closes the underlying channel, which the writer treats as a
/// normal end of stream.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    /// Spawns the writer task and returns a sink plus the receiver side the
    /// transport layer drains onto the socket.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: Event) {
        // A closed receiver means the client disconnected; the scheduler's
        // cancellation path notices independently, so a dropped send here is
        // not itself an error.
        let _ = self.tx.send(event);
    }

    pub fn node_start(&self, node_id: &str) {
        self.emit(Event::NodeStart { node_id: node_id.to_string() });
    }

    pub fn node_finish(&self, node_id: &str, result: Value) {
        self.emit(Event::NodeFinish { node_id: node_id.to_string(), result });
    }

    pub fn node_error(&self, node_id: &str, error: impl ToString) {
        self.emit(Event::NodeError { node_id: node_id.to_string(), error: error.to_string() });
    }

    pub fn node_skipped(&self, node_id: &str) {
        self.emit(Event::NodeSkipped { node_id: node_id.to_string() });
    }

    pub fn token_stream(&self, node_id: &str, token: impl Into<String>) {
        self.emit(Event::TokenStream {
            node_id: node_id.to_string(),
            token: token.into(),
            model_used: None,
            is_fallback: None,
        });
    }

    pub fn node_usage(&self, node_id: &str, usage: Value) {
        self.emit(Event::NodeUsage { node_id: node_id.to_string(), usage });
    }

    pub fn node_progress(&self, node_id: &str, current: usize, total: usize, message: impl Into<String>) {
        self.emit(Event::NodeProgress { node_id: node_id.to_string(), current, total, message: message.into() });
    }
}

/// Adapts the sink to the `llm` crate's fallback notification seam so node
/// executors can hand `stream_with_fallback` a sink without that crate
/// depending on `engine`'s event types.
pub struct FallbackEventSink<'a> {
    pub sink: &'a EventSink,
    pub node_id: &'a str,
}

#[async_trait]
impl<'a> llm::FallbackSink for FallbackEventSink<'a> {
    async fn model_fallback(&self, original_model: &str, fallback_model: &str, attempt: usize, reason: &str) {
        self.sink.emit(Event::ModelFallback {
            node_id: self.node_id.to_string(),
            original_model: original_model.to_string(),
            fallback_model: fallback_model.to_string(),
            attempt,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_tag_matching_wire_string() {
        let json = serde_json::to_string(&Event::NodeStart { node_id: "n1".into() }).unwrap();
        assert!(json.contains("\"type\":\"node_start\""));
        assert!(json.contains("\"node_id\":\"n1\""));
    }

    #[test]
    fn execution_complete_carries_stats() {
        let event = Event::ExecutionComplete { stats: ExecutionStats { completed: 2, failed: 1, total: 3 } };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"completed\":2"));
    }

    #[tokio::test]
    async fn sink_emits_are_received_in_order() {
        let (sink, mut rx) = EventSink::new();
        sink.node_start("a");
        sink.node_finish("a", Value::String("ok".into()));
        match rx.recv().await.unwrap() {
            Event::NodeStart { node_id } => assert_eq!(node_id, "a"),
            other => panic!("unexpected first event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            Event::NodeFinish { node_id, .. } => assert_eq!(node_id, "a"),
            other => panic!("unexpected second event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropping_every_sink_clone_closes_the_channel() {
        let (sink, mut rx) = EventSink::new();
        drop(sink);
        assert!(rx.recv().await.is_none());
    }
}
