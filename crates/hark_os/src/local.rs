use crate::Executor;
use async_trait::async_trait;
use hark_core::{ExecutionOutcome, HarkError, Result};
use std::process::Stdio;
use tokio::process::Command;

/// The scripting shell generated commands are handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalShell {
    PowerShell,
    Sh,
}

impl LocalShell {
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::PowerShell
        } else {
            Self::Sh
        }
    }

    fn command(self, script: &str) -> Command {
        match self {
            Self::PowerShell => {
                let mut cmd = Command::new("powershell");
                cmd.arg("-NoProfile").arg("-Command").arg(script);
                cmd
            }
            Self::Sh => {
                // 使用 sh -c 来支持 shell 特性 (管道, 重定向等)
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(script);
                cmd
            }
        }
    }

    fn program(self) -> &'static str {
        match self {
            Self::PowerShell => "powershell",
            Self::Sh => "sh",
        }
    }
}

pub struct LocalExecutor {
    shell: LocalShell,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self::with_shell(LocalShell::native())
    }

    pub fn with_shell(shell: LocalShell) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &str) -> Result<ExecutionOutcome> {
        let child = self
            .shell
            .command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| HarkError::Launch {
                app: self.shell.program().to_string(),
                reason: e.to_string(),
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| HarkError::Transport(format!("failed to collect command output: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            tracing::debug!("Local command exited with {}", output.status);
        } else if !stderr.is_empty() {
            tracing::debug!("Command stderr (success): {}", stderr);
        }

        Ok(ExecutionOutcome::completed(
            stdout,
            stderr,
            output.status.code(),
        ))
    }

    fn name(&self) -> &str {
        "LocalExecutor"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let exec = LocalExecutor::with_shell(LocalShell::Sh);
        let out = exec.execute("echo hello | tr a-z A-Z").await.unwrap();
        assert_eq!(out.stdout.trim(), "HELLO");
        assert!(out.started);
        assert_eq!(out.exit_code, Some(0));
        assert!(out.succeeded());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_conflated_with_start() {
        let exec = LocalExecutor::with_shell(LocalShell::Sh);
        let out = exec.execute("echo oops >&2; exit 3").await.unwrap();
        assert!(out.started);
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.succeeded());
    }
}
