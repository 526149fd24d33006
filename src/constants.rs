// Defaults for the advisory pipeline, some of them overridable from the environment.

use std::env;

lazy_static::lazy_static! {
    pub static ref OPENAI_BASE_URL: String = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    pub static ref DEFAULT_MODEL: String = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    pub static ref SECRETS_PATH: String = env::var("ADVIES_SECRETS").unwrap_or_else(|_| "secrets.toml".to_string());
    pub static ref TEMPLATES_DIR: String = env::var("ADVIES_TEMPLATES").unwrap_or_else(|_| "templates".to_string());
    pub static ref STATIC_DIR: String = env::var("ADVIES_STATIC").unwrap_or_else(|_| "static".to_string());
}

/// Name of the credential, both as environment variable and as secrets.toml key.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Severity used for a selected pain point that has no weight.
pub const DEFAULT_WEIGHT: u8 = 3;
pub const MIN_WEIGHT: u8 = 1;
pub const MAX_WEIGHT: u8 = 5;

/// Number of transcript turns forwarded to the backend per chat request.
pub const CHAT_CONTEXT_TURNS: usize = 8;
/// Reply ceiling for chat answers.
pub const CHAT_MAX_TOKENS: u32 = 600;

pub const SESSION_COOKIE: &str = "advies_session";

/// Office software offered in the form. Free-form input is accepted as well.
pub const SOFTWARE_CATALOG: &[&str] = &[
    "Exact Online",
    "AFAS",
    "Twinfield",
    "SnelStart",
    "Moneybird",
    "Visma",
    "Microsoft 365",
    "Google Workspace",
];

pub const PAIN_POINT_CATALOG: &[&str] = &[
    "Handmatig werk",
    "Dubbele invoer",
    "Trage facturatie",
    "Geen actueel overzicht",
    "Koppelingen ontbreken",
    "Foutgevoelige processen",
    "Kennis zit bij één persoon",
    "Beveiliging en back-ups",
];
