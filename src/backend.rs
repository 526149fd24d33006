//! Chat completion backend: the request shape, the error kinds and the
//! decision whether a live call should be made at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "openai")]
mod openai;
#[cfg(feature = "openai")]
pub use openai::OpenAiBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// One completion call. Serializes to the body the endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request could not be sent: {0}")]
    Network(String),
    #[error("API key rejected ({status}): {body}")]
    Authentication { status: u16, body: String },
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    MalformedResponse(String),
}

impl BackendError {
    /// Stable tag shown to the user next to the error detail.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Network(_) => "NetworkError",
            BackendError::Authentication { .. } => "AuthenticationError",
            BackendError::Status { .. } => "ApiStatusError",
            BackendError::MalformedResponse(_) => "MalformedResponse",
        }
    }
}

/// A hosted chat completion endpoint. Exactly one attempt per call: no
/// retries and no streaming.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

/// Live calls need the user's opt-in, a credential and a compiled-in client.
pub fn should_use_live_backend(ai_enabled: bool, credential_present: bool, library_available: bool) -> bool {
    ai_enabled && credential_present && library_available
}
