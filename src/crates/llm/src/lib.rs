//! A concrete [`engine_core::ChatModel`] backed by an OpenRouter-compatible
//! API, plus the tiered model-fallback policy the engine's `llm` node
//! executor uses when a call fails.

pub mod config;
pub mod error;
pub mod fallback;
pub mod provider;
pub mod tiers;

pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use fallback::{stream_with_fallback, FallbackSink, NoopSink};
pub use provider::OpenRouterClient;
pub use tiers::fallback_list;
