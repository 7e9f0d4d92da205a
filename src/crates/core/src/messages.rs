//! Message types shared between the engine and its language-model client.
//!
//! A conversation is an ordered sequence of [`Message`]s. The engine owns this
//! sequence per node (see the engine crate's conversation-memory map); this
//! crate only defines the shape of a single turn and the role it was spoken in.

use serde::{Deserialize, Serialize};

/// Who spoke a given turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    Human,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Human, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}
