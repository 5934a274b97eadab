//! # Configuration
//!
//! TOML configuration for the Mnemon CLI (`mnemon.toml` by default).
//! A missing file yields the defaults; the API key is never stored in
//! the file and comes from the environment instead.

use mnemon_core::MnemonError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["MNEMON_API_KEY", "OPENAI_API_KEY"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store backend settings.
    pub store: StoreConfig,
    /// Language-model and embedding endpoint settings.
    pub llm: LlmConfig,
}

/// Store backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the redb database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mnemon.db"),
        }
    }
}

/// Language-model and embedding endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Chat model used for rewrite/remove/conflict/correct calls.
    pub model: String,
    /// Embedding model.
    pub embedding_model: String,
    /// Output dimension of the embedding model.
    pub embedding_dimension: usize,
    /// Attempt budget for transform calls.
    pub attempts: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            attempts: 3,
        }
    }
}

impl Config {
    /// Load the configuration file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, MnemonError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text =
            std::fs::read_to_string(path).map_err(|e| MnemonError::Io(e.to_string()))?;
        toml::from_str(&text).map_err(|e| MnemonError::Serialization(e.to_string()))
    }

    /// The API key from the environment, if any.
    #[must_use]
    pub fn api_key() -> Option<String> {
        API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

// =============================================================================
// TESTS
// =============================================================================
