//! Result Reporter: turns outcomes into labelled entries for the front-end.
//!
//! Nothing here decides anything beyond which category a message belongs to.

use crate::error::HarkError;
use crate::outcome::{CommandResult, ExecutionOutcome, LaunchResult};
use crate::request::TransportKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// Syntax highlighting hint for a generated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxLabel {
    Powershell,
    Bash,
}

impl SyntaxLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Powershell => "powershell",
            Self::Bash => "bash",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Message { level: Level, text: String },
    Code { language: SyntaxLabel, text: String },
    Output { title: String, text: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<Entry>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn success(&mut self, text: impl Into<String>) -> &mut Self {
        self.message(Level::Success, text)
    }

    pub fn info(&mut self, text: impl Into<String>) -> &mut Self {
        self.message(Level::Info, text)
    }

    pub fn error(&mut self, text: impl Into<String>) -> &mut Self {
        self.message(Level::Error, text)
    }

    fn message(&mut self, level: Level, text: impl Into<String>) -> &mut Self {
        self.entries.push(Entry::Message {
            level,
            text: text.into(),
        });
        self
    }

    pub fn code(&mut self, language: SyntaxLabel, text: impl Into<String>) -> &mut Self {
        self.entries.push(Entry::Code {
            language,
            text: text.into(),
        });
        self
    }

    pub fn output(&mut self, title: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.entries.push(Entry::Output {
            title: title.into(),
            text: text.into(),
        });
        self
    }

    /// Messages of the given level, in order.
    pub fn messages(&self, level: Level) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(move |e| match e {
            Entry::Message { level: l, text } if *l == level => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn has_errors(&self) -> bool {
        self.messages(Level::Error).next().is_some()
    }

    pub fn execution(&mut self, transport: TransportKind, outcome: &ExecutionOutcome) -> &mut Self {
        if !outcome.stdout.trim().is_empty() {
            self.output(format!("Output ({})", transport), outcome.stdout.clone());
        }
        if !outcome.stderr.trim().is_empty() {
            self.error(outcome.stderr.clone());
        }

        if !outcome.started {
            self.error("Command could not be started");
        } else if !outcome.succeeded() {
            if outcome.stderr.trim().is_empty() {
                let code = outcome.exit_code.unwrap_or(-1);
                self.error(format!("Command exited with status {}", code));
            }
        } else if outcome.stdout.trim().is_empty() && outcome.stderr.trim().is_empty() {
            self.success("Command completed with no output");
        }
        self
    }

    pub fn refusal(&mut self, result: &CommandResult) -> &mut Self {
        let reason = result.reason.as_deref().unwrap_or_default();
        self.error(HarkError::Refused(reason.to_string()).to_string())
    }

    pub fn launch(&mut self, result: &LaunchResult) -> &mut Self {
        let app = result.app.as_deref().unwrap_or("application");
        if result.launched {
            match &result.path {
                Some(path) => self.success(format!("Launched {} ({})", app, path.display())),
                None => self.success(format!("{} launched successfully!", capitalize(app))),
            }
        } else {
            let reason = result
                .error
                .clone()
                .unwrap_or_else(|| format!("Failed to launch {}", app));
            self.error(reason)
        }
    }

    pub fn failure(&mut self, error: &HarkError) -> &mut Self {
        self.error(error.to_string())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match entry {
                Entry::Message { level, text } => writeln!(f, "[{}] {}", level.tag(), text)?,
                Entry::Code { language, text } => {
                    writeln!(f, "```{}", language.as_str())?;
                    writeln!(f, "{}", text.trim_end())?;
                    writeln!(f, "```")?;
                }
                Entry::Output { title, text } => {
                    writeln!(f, "== {} ==", title)?;
                    writeln!(f, "{}", text.trim_end())?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_execution_success_with_output() {
        let mut report = Report::new();
        report.execution(
            TransportKind::WinRm,
            &ExecutionOutcome::completed("file.txt\n", "", Some(0)),
        );
        assert_eq!(
            report.entries(),
            &[Entry::Output {
                title: "Output (WinRM)".into(),
                text: "file.txt\n".into()
            }]
        );
        assert!(!report.has_errors());
    }

    #[test]
    fn test_execution_failure_without_stderr_names_exit_code() {
        let mut report = Report::new();
        report.execution(TransportKind::Ssh, &ExecutionOutcome::completed("", "", Some(2)));
        let errors: Vec<_> = report.messages(Level::Error).collect();
        assert_eq!(errors, vec!["Command exited with status 2"]);
    }

    #[test]
    fn test_execution_stderr_is_error() {
        let mut report = Report::new();
        report.execution(
            TransportKind::Local,
            &ExecutionOutcome::completed("partial", "access denied", Some(1)),
        );
        assert_eq!(report.entries().len(), 2);
        let errors: Vec<_> = report.messages(Level::Error).collect();
        assert_eq!(errors, vec!["access denied"]);
    }

    #[test]
    fn test_refusal_message() {
        let mut report = Report::new();
        report.refusal(&CommandResult::refusal("requires physical access"));
        let errors: Vec<_> = report.messages(Level::Error).collect();
        assert_eq!(errors, vec!["Cannot execute command: requires physical access"]);
    }

    #[test]
    fn test_launch_messages() {
        let mut report = Report::new();
        report.launch(&LaunchResult::launched("notepad", None));
        report.launch(&LaunchResult::launched(
            "code",
            Some(PathBuf::from("/opt/code/code")),
        ));
        report.launch(&LaunchResult::not_found("zork"));
        let ok: Vec<_> = report.messages(Level::Success).collect();
        assert_eq!(ok[0], "Notepad launched successfully!");
        assert!(ok[1].starts_with("Launched code ("));
        assert!(report.has_errors());
    }

    #[test]
    fn test_display_renders_code_fence() {
        let mut report = Report::new();
        report
            .info("Detected SSH")
            .code(SyntaxLabel::Bash, "ls -la");
        let text = report.to_string();
        assert!(text.contains("[info] Detected SSH"));
        assert!(text.contains("```bash\nls -la\n```"));
    }
}
