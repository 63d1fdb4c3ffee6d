use crate::llm::{CompletionParams, LlmClient};
use anyhow::{Context, Result};
use hark_core::config::LlmConfig;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .context("OpenAI provider needs llm.api_key or OPENAI_API_KEY")?;
        Self::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            api_key,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

/// Chat-completions payload with a system message and one user turn.
/// Shared with the Ollama provider, which speaks the same wire format.
pub(crate) fn chat_payload(model: &str, system: &str, prompt: &str, params: &CompletionParams) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": prompt},
        ],
        "temperature": params.temperature,
        "max_tokens": params.max_tokens,
    })
}

/// Text of the first choice. A missing or null content is an error, not an
/// empty command.
pub(crate) fn first_choice_text(resp_json: &Value) -> Result<String> {
    resp_json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .context("chat completion response has no message content")
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str, params: CompletionParams) -> Result<String> {
        let payload = chat_payload(&self.model, system, prompt, &params);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to OpenAI")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API Error {}: {}", status, error_text);
        }

        let resp_json: Value = response.json().await?;
        first_choice_text(&resp_json)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
