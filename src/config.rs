//! Runtime settings: credential lookup, capability flags and model defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::advisory::ModelSettings;
use crate::backend::{self, CompletionBackend};
use crate::constants::API_KEY_VAR;
use crate::error::AdvisoryError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read secrets file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse secrets file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

/// Key/value secrets read from a TOML file (top-level string entries only).
#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    values: HashMap<String, String>,
}

impl SecretStore {
    /// A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No secrets file");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table: toml::Table = raw.parse().map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let values = table
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect();
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for SecretStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

/// The configured API key, secret store first, then the environment value.
pub fn resolve_api_key(secrets: &SecretStore, env_value: Option<String>) -> Option<String> {
    secrets
        .get(API_KEY_VAR)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| env_value.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()))
}

/// Optional parts compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Capabilities {
    pub live_backend: bool,
    pub docx_export: bool,
}

impl Capabilities {
    pub fn detect() -> Self {
        Self {
            live_backend: cfg!(feature = "openai"),
            docx_export: cfg!(feature = "docx"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: ModelSettings,
    pub ai_enabled: bool,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    pub capabilities: Capabilities,
}

impl Settings {
    pub fn credential_present(&self) -> bool {
        self.api_key.is_some()
    }

    /// Whether a live call is possible once the user has AI switched on.
    pub fn backend_ready(&self) -> bool {
        backend::should_use_live_backend(true, self.credential_present(), self.capabilities.live_backend)
    }

    /// Why live calls are unavailable, for the status indicator.
    pub fn configuration_status(&self) -> Option<AdvisoryError> {
        if !self.capabilities.live_backend {
            Some(AdvisoryError::ConfigurationMissing(
                "deze build bevat geen AI-client".to_string(),
            ))
        } else if !self.credential_present() {
            Some(AdvisoryError::ConfigurationMissing(format!("{API_KEY_VAR} ontbreekt")))
        } else {
            None
        }
    }

    /// The live client, when this build has one and a key is configured.
    pub fn build_backend(&self) -> Option<Box<dyn CompletionBackend>> {
        if !self.backend_ready() {
            info!("Live backend unavailable, using stub responses");
            return None;
        }
        self.live_client()
    }

    #[cfg(feature = "openai")]
    fn live_client(&self) -> Option<Box<dyn CompletionBackend>> {
        let key = self.api_key.clone()?;
        info!(base_url = %self.base_url, "Using OpenAI-compatible backend");
        Some(Box::new(backend::OpenAiBackend::new(self.base_url.clone(), key)))
    }

    #[cfg(not(feature = "openai"))]
    fn live_client(&self) -> Option<Box<dyn CompletionBackend>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings(api_key: Option<&str>) -> Settings {
        Settings {
            api_key: api_key.map(str::to_string),
            base_url: "http://localhost".to_string(),
            model: ModelSettings::default(),
            ai_enabled: true,
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            capabilities: Capabilities { live_backend: true, docx_export: true },
        }
    }

    #[test]
    fn test_secret_store_preferred_over_env() {
        let store: SecretStore = [(API_KEY_VAR.to_string(), "sk-secret".to_string())].into_iter().collect();
        assert_eq!(resolve_api_key(&store, Some("sk-env".to_string())).as_deref(), Some("sk-secret"));
    }

    #[test]
    fn test_env_used_when_store_empty_or_blank() {
        let empty = SecretStore::default();
        assert_eq!(resolve_api_key(&empty, Some("sk-env".to_string())).as_deref(), Some("sk-env"));

        let blank: SecretStore = [(API_KEY_VAR.to_string(), "  ".to_string())].into_iter().collect();
        assert_eq!(resolve_api_key(&blank, Some("sk-env".to_string())).as_deref(), Some("sk-env"));
        assert_eq!(resolve_api_key(&blank, Some(String::new())), None);
        assert_eq!(resolve_api_key(&empty, None), None);
    }

    #[test]
    fn test_load_secrets_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "OPENAI_API_KEY = \"sk-from-file\"\nOTHER = 3").unwrap();
        let store = SecretStore::load(file.path()).unwrap();
        assert_eq!(store.get(API_KEY_VAR), Some("sk-from-file"));
        assert_eq!(store.get("OTHER"), None);
    }

    #[test]
    fn test_missing_secrets_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = SecretStore::load(&dir.path().join("secrets.toml")).unwrap();
        assert_eq!(store.get(API_KEY_VAR), None);
    }

    #[test]
    fn test_malformed_secrets_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "OPENAI_API_KEY = ").unwrap();
        assert!(matches!(SecretStore::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_configuration_status() {
        assert!(settings(Some("sk")).configuration_status().is_none());
        assert!(settings(Some("sk")).backend_ready());
        assert!(matches!(
            settings(None).configuration_status(),
            Some(AdvisoryError::ConfigurationMissing(_))
        ));
        assert!(settings(None).build_backend().is_none());
    }
}
