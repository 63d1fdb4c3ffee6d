//! Integration tests for the CommandGenerator.
//!
//! These use the scripted MockProvider plus a failing client, so the whole
//! prompt → reply → CommandResult path runs without a real LLM.

use anyhow::Result;
use async_trait::async_trait;
use hark_core::config::LlmConfig;
use hark_core::{HarkError, MachineKind};
use hark_reasoning::generator::CommandGenerator;
use hark_reasoning::llm::{CompletionParams, LlmClient};
use hark_reasoning::providers::MockProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Failing client
// ============================================================================

struct UnreachableLlm;

#[async_trait]
impl LlmClient for UnreachableLlm {
    async fn complete(&self, _system: &str, _prompt: &str, _params: CompletionParams) -> Result<String> {
        anyhow::bail!("connection refused (os error 111)")
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

// ============================================================================
// Generation
// ============================================================================

#[tokio::test]
async fn test_prompt_names_the_target_machine() {
    let llm = Arc::new(MockProvider::with_reply("Get-Service"));
    let generator = CommandGenerator::new(llm.clone());

    let result = generator
        .generate(MachineKind::WinRm, "show me all services")
        .await
        .unwrap();

    assert_eq!(result.executable(), Some("Get-Service"));
    assert_eq!(llm.calls(), 1);
    let prompt = llm.last_prompt().unwrap();
    assert!(prompt.contains("Windows(Powershell)"));
    assert!(prompt.contains("show me all services"));
}

#[tokio::test]
async fn test_ssh_target_label() {
    let llm = Arc::new(MockProvider::with_reply("df -h"));
    let generator = CommandGenerator::new(llm.clone());

    generator.generate(MachineKind::Ssh, "disk usage").await.unwrap();
    assert!(llm.last_prompt().unwrap().contains("valid SSH command"));
}

#[tokio::test]
async fn test_refusal_is_not_executable() {
    let llm = Arc::new(MockProvider::with_reply(
        "Cannot execute command: changing the wallpaper needs an interactive session",
    ));
    let generator = CommandGenerator::new(llm);

    let result = generator
        .generate(MachineKind::WinRm, "change my wallpaper")
        .await
        .unwrap();

    assert!(result.refused);
    assert_eq!(result.executable(), None);
    assert_eq!(
        result.reason.as_deref(),
        Some("changing the wallpaper needs an interactive session")
    );
}

#[tokio::test]
async fn test_llm_failure_is_generation_error_without_retry() {
    let generator = CommandGenerator::new(Arc::new(UnreachableLlm));

    let err = generator
        .generate(MachineKind::LocalShell, "list files")
        .await
        .unwrap_err();

    match err {
        HarkError::Generation(msg) => assert!(msg.contains("connection refused")),
        other => panic!("expected Generation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_each_generate_is_one_call() {
    let llm = Arc::new(MockProvider::scripted(["hostname", "whoami"]));
    let generator = CommandGenerator::new(llm.clone());

    let a = generator.generate(MachineKind::Ssh, "host name").await.unwrap();
    let b = generator.generate(MachineKind::Ssh, "current user").await.unwrap();

    assert_eq!(a.executable(), Some("hostname"));
    assert_eq!(b.executable(), Some("whoami"));
    assert_eq!(llm.calls(), 2);
}

#[tokio::test]
async fn test_blank_reply_is_generation_error() {
    let generator = CommandGenerator::new(Arc::new(MockProvider::with_reply("  \n\t ")));

    let err = generator
        .generate(MachineKind::LocalShell, "list files")
        .await
        .unwrap_err();

    assert!(matches!(err, HarkError::Generation(msg) if msg.contains("empty reply")));
}

// ============================================================================
// Config wiring
// ============================================================================

#[tokio::test]
async fn test_from_config_sends_configured_temperature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Get-Date"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = LlmConfig {
        provider: "openai".into(),
        base_url: Some(server.uri()),
        api_key: Some("sk-test".into()),
        temperature: 0.7,
        ..LlmConfig::default()
    };
    let generator = CommandGenerator::from_config(&config).unwrap();
    let result = generator.generate(MachineKind::WinRm, "what time is it").await.unwrap();
    assert_eq!(result.executable(), Some("Get-Date"));

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let sent = body["temperature"].as_f64().unwrap();
    assert!((sent - 0.7).abs() < 1e-6, "sent temperature {sent}");
    assert_eq!(body["model"], "gpt-3.5-turbo");
}
