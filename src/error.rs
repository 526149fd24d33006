use thiserror::Error;

/// Pipeline-level failures. None of them is fatal; the web and CLI layers
/// render each one as text for the user.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("AI-backend niet geconfigureerd: {0}")]
    ConfigurationMissing(String),
    #[error("AI-aanroep mislukt ({kind}): {detail}")]
    BackendCallFailed { kind: &'static str, detail: String },
    #[error("Onvolledige invoer, ontbrekende velden: {}", missing.join(", "))]
    InputIncomplete { missing: Vec<String> },
}
