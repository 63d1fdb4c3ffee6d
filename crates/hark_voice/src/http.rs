//! HTTP transcriber: multipart POST to an OpenAI-compatible
//! `/audio/transcriptions` endpoint (Whisper API, llama-server, ...).

use crate::stt::{AudioFormat, SpeechToText, Transcript};
use async_trait::async_trait;
use hark_core::{HarkConfig, HarkError, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub struct HttpTranscriber {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpTranscriber {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarkError::Config(format!("failed to build STT client: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!("HttpTranscriber: endpoint {}/audio/transcriptions", base_url);
        Ok(Self {
            client,
            base_url,
            model: model.to_string(),
            api_key,
        })
    }

    /// `stt.api_key` falls back to `llm.api_key`.
    pub fn from_config(config: &HarkConfig) -> Result<Self> {
        let api_key = config
            .stt
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| config.llm.api_key().map(str::to_string));
        Self::new(
            &config.stt.base_url,
            &config.stt.model,
            api_key,
            Duration::from_secs(config.stt.timeout_secs),
        )
    }
}

#[async_trait]
impl SpeechToText for HttpTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<Transcript> {
        let audio = tokio::fs::read(path).await.map_err(|e| {
            HarkError::Transcription(format!("cannot read {}: {e}", path.display()))
        })?;
        let format = AudioFormat::from_path(path);
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let part = Part::bytes(audio)
            .file_name(filename)
            .mime_str(format.mime_type())
            .map_err(|e| HarkError::Transcription(e.to_string()))?;
        let form = Form::new().part("file", part).text("model", self.model.clone());

        let mut request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HarkError::Transcription(format!("request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HarkError::Transcription(format!("HTTP {status}: {body}")));
        }

        let resp: Value = response
            .json()
            .await
            .map_err(|e| HarkError::Transcription(format!("invalid response: {e}")))?;
        let text = resp["text"]
            .as_str()
            .ok_or_else(|| HarkError::Transcription("response has no text field".into()))?
            .trim()
            .to_string();
        tracing::debug!("Transcription: {:?}", text);
        Ok(Transcript { text })
    }

    fn provider_name(&self) -> &'static str {
        "http"
    }
}
