use std::path::PathBuf;

/// What the command generator produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: Option<String>,
    pub refused: bool,
    pub reason: Option<String>,
}

impl CommandResult {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            refused: false,
            reason: None,
        }
    }

    pub fn refusal(reason: impl Into<String>) -> Self {
        Self {
            command: None,
            refused: true,
            reason: Some(reason.into()),
        }
    }

    /// The command to run, unless the generator refused.
    pub fn executable(&self) -> Option<&str> {
        if self.refused {
            None
        } else {
            self.command.as_deref()
        }
    }
}

/// Captured result of running one command through a transport.
///
/// `started` and `exit_code` are kept apart: a process can start fine and
/// still report failure, and some transports never report a status at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub started: bool,
    pub exit_code: Option<i32>,
}

impl ExecutionOutcome {
    pub fn completed(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            started: true,
            exit_code,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.started && matches!(self.exit_code, Some(0) | None)
    }
}

/// Result of trying to start a desktop application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchResult {
    pub launched: bool,
    pub app: Option<String>,
    pub path: Option<PathBuf>,
    pub error: Option<String>,
}

impl LaunchResult {
    pub fn launched(app: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            launched: true,
            app: Some(app.into()),
            path,
            error: None,
        }
    }

    pub fn failed(app: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            launched: false,
            app: Some(app.into()),
            path: None,
            error: Some(error.into()),
        }
    }

    pub fn not_found(app: impl Into<String>) -> Self {
        let app = app.into();
        let error = format!("Could not find application '{}' in common paths.", app);
        Self::failed(app, error)
    }
}
