//! `core` — the small set of types shared between the engine and its
//! language-model client: conversation messages, the provider-agnostic
//! [`llm::ChatModel`] trait, and a retry/backoff policy used by both.
//!
//! This crate intentionally knows nothing about graphs, workflows, or node
//! kinds — those live in the `engine` crate. It exists so `engine` and `llm`
//! can depend on a shared vocabulary without depending on each other.

pub mod error;
pub mod llm;
pub mod messages;
pub mod retry;

pub use error::{GraphError, Result};
pub use llm::{ChatModel, ChatRequest, ChatResponse, StreamChunk, UsageMetadata};
pub use messages::{Message, MessageRole};
pub use retry::RetryPolicy;
