//! Ollama LLM Provider
//!
//! Ollama exposes an OpenAI-compatible API at localhost:11434/v1,
//! so we reuse the OpenAI payload and response handling.

use super::openai::{chat_payload, first_choice_text};
use crate::llm::{CompletionParams, LlmClient};
use anyhow::{Context, Result};
use hark_core::config::LlmConfig;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, system: &str, prompt: &str, params: CompletionParams) -> Result<String> {
        let payload = chat_payload(&self.model, system, prompt, &params);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            let status = response.status();
            let err_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama error {}: {}", status, err_text);
        }

        let resp_json: Value = response.json().await?;
        first_choice_text(&resp_json)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_against_local_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ls -la"}}]
            })))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), "llama3", Duration::from_secs(5)).unwrap();
        let text = client.complete("sys", "list files", CompletionParams::default()).await.unwrap();
        assert_eq!(text, "ls -la");
    }
}
