//! Minimal LLM client abstraction.
//!
//! Per spec.md's explicit non-goal, this crate does not ship a client
//! per provider — just the [`LlmClient`] trait the taint analyzer
//! programs against, one generic HTTP-based implementation
//! ([`HttpLlmClient`]) for any OpenAI-compatible chat-completions
//! endpoint, and a scripted [`MockLlmClient`] for tests.

mod http_client;
mod mock;

pub use http_client::HttpLlmClient;
pub use mock::MockLlmClient;

use async_trait::async_trait;

use crate::error::LlmError;

/// Role of one message in a chat-completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// A turn from the analyzer.
    User,
    /// A turn from the model.
    Assistant,
}

/// One message in a conversation, in the shape every OpenAI-compatible
/// chat-completions API expects.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    /// Who sent this message.
    pub role: Role,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Builds a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Builds a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Builds an assistant message, used to replay a model's own prior
    /// response back into the conversation (e.g. ahead of a correction
    /// prompt).
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Abstraction over a chat-completions call, implemented once for real
/// HTTP traffic and once as a scripted test double.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends `messages` as one chat-completion request and returns the
    /// assistant's raw text response.
    async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}
