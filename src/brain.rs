use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use crate::config::Settings;
use crate::error::AgentError;

/// A language model that answers a prompt with free text.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Google Generative Language (`generateContent`) client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GeminiClient {
    pub fn with_base(
        api_key: impl Into<String>,
        model: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::provider(format!("could not build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AgentError> {
        let api_key = settings
            .gemini_api_key
            .clone()
            .ok_or_else(|| AgentError::config("GEMINI_API_KEY not set in environment"))?;
        Self::with_base(
            api_key,
            settings.model.clone(),
            settings.api_base.clone(),
            settings.request_timeout,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ModelProvider for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AgentError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
                "generationConfig": { "temperature": 0.2 },
            }))
            .send()
            .await
            .map_err(|e| AgentError::provider(format!("request failed: {e}")))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| AgentError::provider(format!("unreadable response: {e}")))?;

        if !status.is_success() {
            let err_msg = body["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            return Err(AgentError::provider(format!(
                "Gemini API error ({status}): {err_msg}"
            )));
        }

        let text = response_text(&body)
            .ok_or_else(|| AgentError::provider(format!("No content in LLM response: {body}")))?;
        debug!(model = %self.model, "LLM says: {text}");
        Ok(text)
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(body: &Value) -> Option<String> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() { None } else { Some(text) }
}
