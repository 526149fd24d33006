//! Produces the advisory document for a composed request, live or stubbed.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{ChatMessage, CompletionBackend, CompletionRequest};
use crate::constants::{API_KEY_VAR, DEFAULT_TEMPERATURE};
use crate::error::AdvisoryError;
use crate::prompt::AdvisoryRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisorySource {
    LiveModel,
    Stub,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: crate::constants::DEFAULT_MODEL.clone(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryResult {
    pub text: String,
    pub generated_at: DateTime<Local>,
    pub source: AdvisorySource,
}

impl AdvisoryResult {
    fn new(text: String, source: AdvisorySource) -> Self {
        Self { text, generated_at: Local::now(), source }
    }

    /// Timestamp as shown in the UI and in exported documents.
    pub fn generated_at_display(&self) -> String {
        self.generated_at.format("%d-%m-%Y %H:%M").to_string()
    }
}

/// Explains what would have been sent, verbatim, and how to enable the backend.
pub fn render_stub(request: &AdvisoryRequest) -> String {
    format!(
        "🔒 AI staat uit of er is geen API-key.\n\n\
        Dit is de samengestelde opdracht (prompt) die normaal naar het model zou gaan.\n\n\
        **Systeeminstructie:**\n{}\n\n\
        **Opdracht:**\n{}\n\n\
        Zet `{}` in `secrets.toml` of als omgevingsvariabele en schakel AI in om een \
        gegenereerd advies te krijgen.",
        request.system_instruction, request.user_instruction, API_KEY_VAR
    )
}

/// User-facing text for a failed call.
pub fn render_failure(err: &AdvisoryError) -> String {
    format!("⚠️ {err}")
}

pub async fn generate(
    request: &AdvisoryRequest,
    use_live: bool,
    backend: Option<&dyn CompletionBackend>,
    model: &ModelSettings,
) -> AdvisoryResult {
    let backend = match backend {
        Some(backend) if use_live => backend,
        _ => {
            info!("Generating stub advice");
            return AdvisoryResult::new(render_stub(request), AdvisorySource::Stub);
        }
    };

    let completion = CompletionRequest {
        model: model.model.clone(),
        temperature: model.temperature,
        messages: vec![
            ChatMessage::system(&request.system_instruction),
            ChatMessage::user(&request.user_instruction),
        ],
        max_tokens: None,
    };

    info!(model = %model.model, "Requesting advice from backend");
    match backend.complete(&completion).await {
        Ok(text) => AdvisoryResult::new(text.trim().to_string(), AdvisorySource::LiveModel),
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "Advice generation failed");
            let failure = AdvisoryError::BackendCallFailed { kind: e.kind(), detail: e.to_string() };
            AdvisoryResult::new(render_failure(&failure), AdvisorySource::Error)
        }
    }
}
