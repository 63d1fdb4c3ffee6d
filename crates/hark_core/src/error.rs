use std::time::Duration;
use thiserror::Error;

/// Errors that can end a single request cycle.
///
/// None of these are fatal to the process: the dispatcher turns every variant
/// into a report entry and the front-end moves on to the next submission.
#[derive(Debug, Error)]
pub enum HarkError {
    /// Probe or connect failure. Never retried.
    #[error("network error: {0}")]
    Network(String),

    /// Remote login was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The command generator declined to produce a command.
    #[error("Cannot execute command: {0}")]
    Refused(String),

    /// A local process could not be started.
    #[error("failed to launch {app}: {reason}")]
    Launch { app: String, reason: String },

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("command did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    /// The generation service could not be reached or answered garbage.
    #[error("command generation failed: {0}")]
    Generation(String),

    /// Protocol-level failure after a connection was established.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl HarkError {
    /// Short category name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Authentication(_) => "authentication",
            Self::Refused(_) => "refused",
            Self::Launch { .. } => "launch",
            Self::Transcription(_) => "transcription",
            Self::DeadlineExceeded(_) => "deadline",
            Self::Generation(_) => "generation",
            Self::Transport(_) => "transport",
            Self::Config(_) => "config",
        }
    }
}

pub type Result<T, E = HarkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_display_keeps_marker() {
        let err = HarkError::Refused("requires a GUI".into());
        assert_eq!(err.to_string(), "Cannot execute command: requires a GUI");
        assert_eq!(err.kind(), "refused");
    }

    #[test]
    fn test_deadline_display() {
        let err = HarkError::DeadlineExceeded(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }
}
