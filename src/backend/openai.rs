use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, instrument};

use super::{BackendError, CompletionBackend, CompletionRequest};

// Only the fields we read from /chat/completions.
#[derive(Deserialize, Debug)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    #[instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let url = self.endpoint();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Chat completion request failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Authentication {
                    status: status.as_u16(),
                    body,
                },
                _ => BackendError::Status { status: status.as_u16(), body },
            });
        }

        let parsed = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::MalformedResponse("response contains no message content".to_string()))?;

        debug!(chars = content.len(), "Received chat completion");
        Ok(content.trim().to_string())
    }
}
