//! The [`ChatModel`] trait: the one seam node executors and LM clients agree on.

use crate::error::Result;
use crate::llm::config::{ChatRequest, ChatResponse, StreamChunk};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type ChatStream = BoxStream<'static, Result<StreamChunk>>;

/// A provider-agnostic chat-completion client.
///
/// Implementations must be `Send + Sync` so they can live behind an
/// `Arc<dyn ChatModel>` shared across concurrently-dispatched node handlers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One-shot completion.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Streaming completion: a sequence of text deltas terminated by a usage tally.
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream>;

    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::config::UsageMetadata;
    use crate::messages::Message;
    use futures::stream;
    use std::sync::Arc;

    #[derive(Clone)]
    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                message: Message::assistant(format!("echo:{}", request.messages.len())),
                usage: Some(UsageMetadata::new(1, 1)),
                metadata: Default::default(),
            })
        }

        async fn stream(&self, _request: ChatRequest) -> Result<ChatStream> {
            Ok(Box::pin(stream::iter(vec![
                Ok(StreamChunk::Delta("echo".to_string())),
                Ok(StreamChunk::Done { usage: Some(UsageMetadata::new(1, 1)) }),
            ])))
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    #[tokio::test]
    async fn trait_object_is_usable_behind_arc() {
        let model: Arc<dyn ChatModel> = Arc::new(EchoModel);
        let response = model
            .chat(ChatRequest::new("m", vec![Message::human("hi")]))
            .await
            .unwrap();
        assert_eq!(response.message.content, "echo:1");
    }
}
