//! OpenAI-compatible chat-completions source.
//!
//! Most hosted models (OpenAI, Grok, Gemini's compatibility endpoint, local
//! gateways) accept the same request shape, so one [`SourceCall`] covers
//! them. The API key is read from the environment once, at construction,
//! and owned by the instance.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::adjudicator::SourceCall;
use crate::error::{AdjudicatorError, Result, SourceError};

/// System prompt used for toxicity classification.
pub const DEFAULT_CLASSIFY_PROMPT: &str = "Classify the following statement as either \
'toxic' or 'neutral'. Respond with a single word.";

/// System prompt used when re-screening a disagreement row for its toxic term.
pub const DEFAULT_SCREEN_PROMPT: &str =
    "Identify the toxic term of the following sentence. Respond with the toxic term.";

/// Status codes treated as capacity errors.
const RATE_LIMIT_STATUSES: &[u16] = &[429, 503, 529];

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

fn default_timeout_secs() -> u64 {
    30
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Column suffix in the row store.
    pub name: String,
    /// Full chat-completions URL.
    pub endpoint: String,
    /// Model identifier sent in the request body.
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    /// Overrides [`DEFAULT_CLASSIFY_PROMPT`].
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// HTTP-backed [`SourceCall`].
pub struct ChatCompletionSource {
    name: String,
    endpoint: String,
    model: String,
    api_key: String,
    system_prompt: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for ChatCompletionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionSource")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionSource {
    /// Builds a source from its config, reading the API key from the environment.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            AdjudicatorError::Config(
                config.name.clone(),
                format!("environment variable {} is not set", config.api_key_env),
            )
        })?;
        Self::new(config, api_key)
    }

    /// Builds a source with an explicit API key.
    pub fn new(config: &SourceConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AdjudicatorError::Config(config.name.clone(), e.to_string()))?;

        Ok(Self {
            name: config.name.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_CLASSIFY_PROMPT.to_string()),
            client,
        })
    }

    /// Replaces the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The active system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": text}
            ],
            "temperature": 0.0
        })
    }
}

#[async_trait]
impl SourceCall for ChatCompletionSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, text: &str) -> std::result::Result<String, SourceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let content = extract_content(&json)?;
        debug!(source = %self.name, answer = %content, "source answered");
        Ok(content)
    }
}

/// Reads `choices[0].message.content` from a chat-completions payload.
pub fn extract_content(json: &serde_json::Value) -> std::result::Result<String, SourceError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| SourceError::Malformed("missing choices[0].message.content".to_string()))
}

/// Maps a non-success HTTP status to a [`SourceError`].
pub fn classify_status(status: u16, body: &str) -> SourceError {
    let snippet: String = body.chars().take(MAX_ERROR_BODY).collect();
    let message = format!("HTTP {status}: {snippet}");
    if RATE_LIMIT_STATUSES.contains(&status) {
        SourceError::RateLimited(message)
    } else {
        SourceError::Permanent(message)
    }
}

/// Maps a transport-level failure to a [`SourceError`].
pub fn classify_transport(err: reqwest::Error) -> SourceError {
    if err.is_timeout() || err.is_connect() {
        SourceError::Timeout(err.to_string())
    } else {
        SourceError::Permanent(err.to_string())
    }
}
