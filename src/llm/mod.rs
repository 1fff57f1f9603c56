//! LLM client module for interacting with language models.
//!
//! This module provides a trait-based abstraction over chat-completion
//! providers, with DeepSeek's OpenAI-compatible API as the primary
//! implementation.

mod error;
mod openai_compat;

pub use error::{LlmError, LlmErrorKind, RetryConfig};
pub use openai_compat::OpenAiCompatibleClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
///
/// The ReAct protocol encodes tool observations as `User` turns, so plain
/// text content is all the transcript ever carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Trait for completion clients.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send the transcript and return the model's textual completion.
    async fn generate(&self, model: &str, messages: &[ChatMessage]) -> anyhow::Result<String>;
}
