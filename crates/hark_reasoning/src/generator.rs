use crate::llm::{CompletionParams, LlmClient};
use crate::prompts::{CommandPrompt, REFUSAL_MARKER, SYSTEM_PROMPT};
use crate::providers;
use hark_core::config::LlmConfig;
use hark_core::{CommandResult, HarkError, MachineKind, Result};
use std::sync::Arc;

/// Turns free text into one shell command for a given target, or a refusal.
pub struct CommandGenerator {
    client: Arc<dyn LlmClient>,
    params: CompletionParams,
}

impl CommandGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            params: CompletionParams::default(),
        }
    }

    /// Provider and sampling parameters from `[llm]`.
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = providers::from_config(config)?;
        Ok(Self::new(client).with_params(CompletionParams::from_config(config)))
    }

    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    /// One LLM call, no retry.
    pub async fn generate(&self, machine: MachineKind, user_text: &str) -> Result<CommandResult> {
        let prompt = CommandPrompt::render(machine.label(), user_text);
        tracing::debug!("Generating {} command via {}", machine.label(), self.client.name());

        let reply = self
            .client
            .complete(SYSTEM_PROMPT, &prompt, self.params.clone())
            .await
            .map_err(|e| HarkError::Generation(format!("{:#}", e)))?;
        if reply.trim().is_empty() {
            return Err(HarkError::Generation(format!(
                "{} returned an empty reply",
                self.client.name()
            )));
        }

        let result = interpret(&reply);
        if result.refused {
            tracing::info!("Generator refused: {}", result.reason.as_deref().unwrap_or(""));
        } else {
            tracing::debug!("Generated command: {}", result.command.as_deref().unwrap_or(""));
        }
        Ok(result)
    }
}

/// Classify a raw model reply as a command or a refusal.
pub fn interpret(reply: &str) -> CommandResult {
    let trimmed = reply.trim();
    let is_refusal = trimmed
        .get(..REFUSAL_MARKER.len())
        .map_or(false, |head| head.eq_ignore_ascii_case(REFUSAL_MARKER));

    if is_refusal {
        let rest = trimmed[REFUSAL_MARKER.len()..].trim_start();
        let reason = rest.strip_prefix(':').unwrap_or(rest).trim();
        CommandResult::refusal(reason)
    } else {
        CommandResult::command(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_trimmed_reply() {
        let r = interpret("  Get-Process | Sort-Object CPU  \n");
        assert!(!r.refused);
        assert_eq!(r.command.as_deref(), Some("Get-Process | Sort-Object CPU"));
        assert_eq!(r.reason, None);
    }

    #[test]
    fn test_refusal_any_case() {
        let r = interpret("cannot EXECUTE command: needs a GUI session");
        assert!(r.refused);
        assert_eq!(r.command, None);
        assert_eq!(r.reason.as_deref(), Some("needs a GUI session"));
    }

    #[test]
    fn test_refusal_without_colon() {
        let r = interpret("Cannot execute command");
        assert!(r.refused);
        assert_eq!(r.reason.as_deref(), Some(""));
    }

    #[test]
    fn test_marker_must_be_a_prefix() {
        let r = interpret("echo 'Cannot execute command: x'");
        assert!(!r.refused);
    }

    #[test]
    fn test_multibyte_reply_shorter_than_marker() {
        let r = interpret("日本語");
        assert!(!r.refused);
        assert_eq!(r.command.as_deref(), Some("日本語"));
    }
}
