//! Configuration types.
//!
//! Everything comes from the process environment (after `.env` is loaded).
//! Values are opaque: only presence and basic parsing are checked.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::generator::DEFAULT_MAX_TOKENS;
use crate::llm::local::DEFAULT_LOCAL_MODEL;
use crate::llm::mistral::{self, MistralConfig};
use crate::pipeline::classifier::ClassifierMode;
use crate::pipeline::rules::KeywordLists;

pub const DEFAULT_PORT: u16 = 8000;

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Remote provider; `None` when `MISTRAL_API_KEY` is empty or unset.
    pub remote: Option<MistralConfig>,
    /// HuggingFace model id for the local tier.
    pub local_model: String,
    /// Default generation budget.
    pub max_tokens: u32,
    pub classifier_mode: ClassifierMode,
    /// Optional JSON file overriding the keyword lists.
    pub keywords_file: Option<PathBuf>,
    pub port: u16,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is fine; values may come from the real environment.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let remote = non_empty("MISTRAL_API_KEY").map(|api_key| MistralConfig {
            api_key: SecretString::from(api_key),
            model: non_empty("MISTRAL_MODEL").unwrap_or_else(|| mistral::DEFAULT_MODEL.to_string()),
            base_url: non_empty("MISTRAL_BASE_URL")
                .unwrap_or_else(|| mistral::DEFAULT_BASE_URL.to_string()),
        });

        let local_model =
            non_empty("LOCAL_MODEL_NAME").unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

        let max_tokens = match non_empty("MAX_TOKENS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                key: "MAX_TOKENS".into(),
                message: format!("'{raw}': {e}"),
            })?,
            None => DEFAULT_MAX_TOKENS,
        };

        let classifier_mode = match non_empty("CLASSIFIER_MODE") {
            Some(raw) => raw
                .parse::<ClassifierMode>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "CLASSIFIER_MODE".into(),
                    message,
                })?,
            None => ClassifierMode::default(),
        };

        let port = match non_empty("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT".into(),
                message: format!("'{raw}': {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            remote,
            local_model,
            max_tokens,
            classifier_mode,
            keywords_file: non_empty("KEYWORDS_FILE").map(PathBuf::from),
            port,
        })
    }

    /// Keyword lists from `keywords_file`, or the built-in defaults.
    pub fn keyword_lists(&self) -> Result<KeywordLists, ConfigError> {
        match &self.keywords_file {
            Some(path) => KeywordLists::from_file(path),
            None => Ok(KeywordLists::default()),
        }
    }
}
