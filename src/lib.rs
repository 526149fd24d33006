pub mod advisory;
pub mod backend;
pub mod chat;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod prompt;
pub mod questionnaire;
pub mod session;
pub mod tokens;
pub mod web_server;

pub use advisory::{generate, AdvisoryResult, AdvisorySource, ModelSettings};
pub use backend::{should_use_live_backend, CompletionBackend};
pub use chat::{respond, ChatTranscript};
pub use prompt::{compose, AdvisoryRequest};
pub use questionnaire::{ApproachPreference, QuestionnaireInput};
