//! Traits and wire types for pluggable chat-completion providers.
//!
//! This crate does not talk to any provider itself — it defines the
//! [`ChatModel`] trait and the request/response shapes the engine's node
//! executors and the `llm` crate's concrete client agree on.

pub mod config;
pub mod traits;

pub use config::{ChatConfig, ChatRequest, ChatResponse, StreamChunk, UsageMetadata};
pub use traits::{ChatModel, ChatStream};
