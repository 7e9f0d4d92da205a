//! Request/response shapes for [`super::traits::ChatModel`].

use crate::messages::Message;
use std::collections::HashMap;

/// Sampling parameters for a single completion request.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub temperature: f32,
    pub max_tokens: Option<usize>,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub stop_sequences: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: Vec::new(),
        }
    }
}

/// A chat-completion request: a model id, the full message history, and sampling config.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub config: ChatConfig,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            config: ChatConfig::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }
}

/// Token accounting for a completed call. `total_tokens` is not required to equal
/// `input_tokens + output_tokens` verbatim (providers sometimes round), but engine
/// callers treat it as authoritative when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageMetadata {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

impl UsageMetadata {
    pub fn new(input_tokens: usize, output_tokens: usize) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A single non-streaming completion result.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<UsageMetadata>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// One piece of a streaming completion: either more text or the final usage tally.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    Delta(String),
    Done { usage: Option<UsageMetadata> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_temperature_matches_spec_default() {
        assert_eq!(ChatConfig::default().temperature, 0.7);
    }

    #[test]
    fn usage_totals_input_and_output() {
        let usage = UsageMetadata::new(100, 40);
        assert_eq!(usage.total_tokens, 140);
    }
}
