pub mod mock;
pub mod ollama;
pub mod openai;

use crate::llm::LlmClient;
use anyhow::Result;
use hark_core::config::LlmConfig;
use std::sync::Arc;

pub use mock::MockProvider;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Build the client named by `llm.provider`.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Arc<dyn LlmClient> = match config.provider.as_str() {
        "openai" => Arc::new(OpenAiClient::from_config(config)?),
        "ollama" => Arc::new(OllamaClient::from_config(config)?),
        "mock" => Arc::new(MockProvider::new(&config.model)),
        other => anyhow::bail!("Unknown LLM provider: {}", other),
    };
    tracing::info!("Using LLM provider {} (model {})", client.name(), config.model);
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_provider() {
        let mock = LlmConfig {
            provider: "mock".into(),
            ..LlmConfig::default()
        };
        assert!(from_config(&mock).is_ok());

        let ollama = LlmConfig {
            provider: "ollama".into(),
            model: "llama3".into(),
            ..LlmConfig::default()
        };
        assert_eq!(from_config(&ollama).unwrap().name(), "ollama");

        let unknown = LlmConfig {
            provider: "clippy".into(),
            ..LlmConfig::default()
        };
        assert!(from_config(&unknown).is_err());
    }
}
