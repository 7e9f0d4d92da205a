//! An OpenRouter-compatible [`ChatModel`] implementation.
//!
//! Uses an OpenAI-compatible chat-completions endpoint. `chat` is a plain
//! POST/JSON round trip; `stream` sets `"stream": true` and parses the
//! response body as a server-sent-events byte stream, yielding one
//! [`StreamChunk::Delta`] per `data:` line and a final [`StreamChunk::Done`]
//! once the provider sends `data: [DONE]` or usage accompanying the last chunk.

use crate::config::RemoteLlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use engine_core::error::Result as CoreResult;
use engine_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStream, StreamChunk, UsageMetadata};
use engine_core::{Message, MessageRole};
use futures::stream::{self, StreamExt};
use futures_util::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone)]
pub struct OpenRouterClient {
    config: RemoteLlmConfig,
    client: Client,
    app_name: Option<String>,
}

impl OpenRouterClient {
    pub fn new(config: RemoteLlmConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            config,
            client,
            app_name: None,
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    fn convert_message(msg: &Message) -> OpenRouterMessage {
        OpenRouterMessage {
            role: match msg.role {
                MessageRole::System => "system",
                MessageRole::Human => "user",
                MessageRole::Assistant => "assistant",
            }
            .to_string(),
            content: msg.content.clone(),
        }
    }

    fn build_request(&self, request: &ChatRequest, model: &str, stream: bool) -> OpenRouterRequest {
        OpenRouterRequest {
            model: model.to_string(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: Some(request.config.temperature),
            max_tokens: request.config.max_tokens,
            top_p: request.config.top_p,
            frequency_penalty: request.config.frequency_penalty,
            presence_penalty: request.config.presence_penalty,
            stop: if request.config.stop_sequences.is_empty() {
                None
            } else {
                Some(request.config.stop_sequences.clone())
            },
            stream,
        }
    }

    fn auth_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder.header("Authorization", format!("Bearer {}", self.config.api_key));
        if let Some(app_name) = &self.app_name {
            builder = builder.header("HTTP-Referer", app_name).header("X-Title", app_name);
        }
        builder
    }

    fn map_status_error(status: reqwest::StatusCode, body: String) -> LlmError {
        match status.as_u16() {
            401 => LlmError::AuthenticationError(body),
            429 => LlmError::RateLimitExceeded(body),
            _ => LlmError::ProviderError(format!("openrouter returned {status}: {body}")),
        }
    }

    /// One-shot completion against a specific model id, bypassing the request's own
    /// `model` field. Used by the fallback policy to retry a fresh attempt with a
    /// substitute model without rebuilding the whole request.
    pub async fn chat_with_model(&self, request: &ChatRequest, model: &str) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.build_request(request, model, false);

        let response = self.auth_headers(self.client.post(&url).json(&body)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_status_error(status, text));
        }

        let parsed: OpenRouterResponse = response.json().await.map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        convert_response(parsed)
    }

    /// Streaming completion against a specific model id.
    pub async fn stream_with_model(&self, request: &ChatRequest, model: &str) -> Result<ChatStream, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = self.build_request(request, model, true);

        let response = self.auth_headers(self.client.post(&url).json(&body)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_status_error(status, text));
        }

        let byte_stream = response.bytes_stream().map_err(LlmError::from);
        Ok(Box::pin(sse_to_chunks(byte_stream)))
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    async fn chat(&self, request: ChatRequest) -> CoreResult<ChatResponse> {
        let model = request.model.clone();
        self.chat_with_model(&request, &model).await.map_err(Into::into)
    }

    async fn stream(&self, request: ChatRequest) -> CoreResult<ChatStream> {
        let model = request.model.clone();
        self.stream_with_model(&request, &model).await.map_err(Into::into)
    }

    fn clone_box(&self) -> Box<dyn ChatModel> {
        Box::new(self.clone())
    }
}

fn convert_response(resp: OpenRouterResponse) -> Result<ChatResponse, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("response had no choices".to_string()))?;

    let usage = resp.usage.map(|u| UsageMetadata::new(u.prompt_tokens, u.completion_tokens));

    let mut metadata = HashMap::new();
    metadata.insert("model".to_string(), serde_json::Value::String(resp.model));
    if let Some(reason) = choice.finish_reason {
        metadata.insert("finish_reason".to_string(), serde_json::Value::String(reason));
    }

    Ok(ChatResponse {
        message: Message::assistant(choice.message.content),
        usage,
        metadata,
    })
}

/// Turns a raw SSE byte stream (`data: {...}\n\n` frames) into [`StreamChunk`]s.
///
/// Buffers across chunk boundaries since a `data:` line can be split across
/// multiple TCP reads; splits on `\n\n` to find complete frames.
fn sse_to_chunks(
    byte_stream: impl futures::Stream<Item = Result<bytes::Bytes, LlmError>> + Send + 'static,
) -> impl futures::Stream<Item = Result<StreamChunk, engine_core::error::GraphError>> + Send + 'static {
    let state = SseState {
        buffer: String::new(),
        done: false,
    };

    stream::unfold((Box::pin(byte_stream), state), |(mut source, mut state)| async move {
        loop {
            if let Some(chunk) = state.pop_ready_frame() {
                return Some((chunk.map_err(Into::into), (source, state)));
            }
            if state.done {
                return None;
            }
            match source.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&bytes));
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err.into()), (source, state)));
                }
                None => {
                    state.done = true;
                }
            }
        }
    })
}

struct SseState {
    buffer: String,
    done: bool,
}

impl SseState {
    /// Pops one complete `data:` frame from the buffer, if any, and turns it
    /// into a [`StreamChunk`]. Returns `None` when no complete frame is
    /// buffered yet (caller should read more bytes).
    fn pop_ready_frame(&mut self) -> Option<Result<StreamChunk, LlmError>> {
        loop {
            let newline = self.buffer.find('\n')?;
            let line = self.buffer[..newline].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline);

            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() {
                continue;
            }
            if payload == "[DONE]" {
                self.done = true;
                return Some(Ok(StreamChunk::Done { usage: None }));
            }

            let parsed: Result<OpenRouterStreamEvent, _> = serde_json::from_str(payload);
            return Some(match parsed {
                Ok(event) => Ok(event.into_chunk()),
                Err(err) => Err(LlmError::SerializationError(err.to_string())),
            });
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenRouterMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenRouterMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenRouterResponse {
    model: String,
    choices: Vec<OpenRouterChoice>,
    usage: Option<OpenRouterUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct OpenRouterStreamEvent {
    choices: Vec<OpenRouterStreamChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterStreamChoice {
    delta: OpenRouterDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenRouterDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterStreamEvent {
    fn into_chunk(self) -> StreamChunk {
        if let Some(usage) = self.usage {
            return StreamChunk::Done {
                usage: Some(UsageMetadata::new(usage.prompt_tokens, usage.completion_tokens)),
            };
        }
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .unwrap_or_default();
        StreamChunk::Delta(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenRouterClient {
        OpenRouterClient::new(RemoteLlmConfig::new("test-key", "https://openrouter.ai/api/v1"))
    }

    #[test]
    fn app_name_round_trips() {
        let c = client().with_app_name("my-app");
        assert_eq!(c.app_name.as_deref(), Some("my-app"));
    }

    #[test]
    fn message_conversion_maps_roles() {
        let human = OpenRouterClient::convert_message(&Message::human("hi"));
        assert_eq!(human.role, "user");
        let system = OpenRouterClient::convert_message(&Message::system("you are helpful"));
        assert_eq!(system.role, "system");
    }

    #[test]
    fn sse_frame_parses_delta() {
        let mut state = SseState {
            buffer: "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n".to_string(),
            done: false,
        };
        let chunk = state.pop_ready_frame().unwrap().unwrap();
        assert!(matches!(chunk, StreamChunk::Delta(ref s) if s == "hi"));
    }

    #[test]
    fn sse_done_sentinel_ends_stream() {
        let mut state = SseState {
            buffer: "data: [DONE]\n\n".to_string(),
            done: false,
        };
        let chunk = state.pop_ready_frame().unwrap().unwrap();
        assert!(matches!(chunk, StreamChunk::Done { usage: None }));
        assert!(state.done);
    }

    #[test]
    fn status_error_maps_auth_and_rate_limit() {
        assert!(matches!(
            OpenRouterClient::map_status_error(reqwest::StatusCode::UNAUTHORIZED, "x".into()),
            LlmError::AuthenticationError(_)
        ));
        assert!(matches!(
            OpenRouterClient::map_status_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "x".into()),
            LlmError::RateLimitExceeded(_)
        ));
    }
}
