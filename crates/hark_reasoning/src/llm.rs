use anyhow::Result;
use async_trait::async_trait;
use hark_core::config::LlmConfig;

/// Sampling parameters for one completion.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    /// Maximum tokens to generate (will be clamped to provider limits)
    pub max_tokens: u32,
    /// Sampling temperature (0.0 - 2.0)
    pub temperature: f32,
}

impl CompletionParams {
    /// Defaults with the configured temperature.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            ..Self::default()
        }
    }
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.0,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one system + user prompt pair and return the assistant's text.
    async fn complete(&self, system: &str, prompt: &str, params: CompletionParams) -> Result<String>;

    /// Provider name (for logs)
    fn name(&self) -> &str;
}

// Providers available in crate::providers
