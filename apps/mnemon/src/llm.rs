//! # OpenAI-compatible Client
//!
//! Blocking HTTP client for the chat-completion and embedding endpoints,
//! implementing the engine's `LanguageModel` and `EmbeddingProvider`
//! contracts. Transport and protocol failures surface as
//! `MnemonError::Transport`; content-level retry lives in the engine's
//! transform wrapper, not here.

use crate::config::{Config, LlmConfig};
use mnemon_core::{EmbeddingProvider, LanguageModel, MnemonError};
use serde_json::{Value, json};
use tracing::debug;

/// HTTP client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    embedding_model: String,
    dimension: usize,
}

impl OpenAiClient {
    /// Build a client from the LLM configuration; the API key comes
    /// from the environment.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: Config::api_key(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
        }
    }

    /// POST a JSON body and parse the JSON response, with Bearer auth.
    fn post(&self, path: &str, body: &Value) -> Result<Value, MnemonError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "llm request");
        let mut request = self.http.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .map_err(|e| MnemonError::Transport(format!("{url}: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MnemonError::Transport(
                "unauthorized: invalid or missing API key".to_string(),
            ));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MnemonError::Transport(
                "rate limited: too many requests".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MnemonError::Transport(format!(
                "server error ({status}): {body}"
            )));
        }
        response
            .json::<Value>()
            .map_err(|e| MnemonError::Transport(format!("parse error: {e}")))
    }
}

impl LanguageModel for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String, MnemonError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt,
                }
            ],
            "temperature": 1,
            "max_tokens": 2048,
        });
        let response = self.post("/chat/completions", &body)?;
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                MnemonError::Transport("chat response missing message content".to_string())
            })
    }
}

impl EmbeddingProvider for OpenAiClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, MnemonError> {
        let body = json!({
            "model": self.embedding_model,
            "input": [text],
        });
        let response = self.post("/embeddings", &body)?;
        let values = response["data"][0]["embedding"]
            .as_array()
            .ok_or_else(|| {
                MnemonError::Transport("embedding response missing vector".to_string())
            })?;
        Ok(values
            .iter()
            .filter_map(Value::as_f64)
            .map(|v| v as f32)
            .collect())
    }
}
