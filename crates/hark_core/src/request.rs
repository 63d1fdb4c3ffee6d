use crate::report::SyntaxLabel;
use std::fmt;

/// The only host value that is routed to the local machine.
pub const LOCALHOST: &str = "localhost";

/// True when `host` names the local machine. No other spelling (127.0.0.1,
/// the machine's own hostname) short-circuits the probe.
pub fn is_localhost(host: &str) -> bool {
    host.trim().eq_ignore_ascii_case(LOCALHOST)
}

/// A password that never shows up in logs or debug output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// One user submission. Built once per interaction and dropped after the
/// dispatcher has reported on it.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub free_text: String,
    pub host: String,
    pub credentials: Credentials,
}

impl ExecutionRequest {
    pub fn new(
        free_text: impl Into<String>,
        host: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            free_text: free_text.into(),
            host: host.into().trim().to_string(),
            credentials,
        }
    }

    pub fn is_local(&self) -> bool {
        is_localhost(&self.host)
    }
}

/// Which back-end a request is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Local,
    WinRm,
    Ssh,
    Unreachable,
}

impl TransportKind {
    /// Machine kind handed to the command generator, if the transport can run
    /// anything at all.
    pub fn machine_kind(self) -> Option<MachineKind> {
        match self {
            Self::Local => Some(MachineKind::LocalShell),
            Self::WinRm => Some(MachineKind::WinRm),
            Self::Ssh => Some(MachineKind::Ssh),
            Self::Unreachable => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Local => "Local",
            Self::WinRm => "WinRM",
            Self::Ssh => "SSH",
            Self::Unreachable => "Unreachable",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Target flavour a command is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineKind {
    LocalShell,
    WinRm,
    Ssh,
}

impl MachineKind {
    /// Label substituted into the generation prompt.
    pub fn label(self) -> &'static str {
        match self {
            Self::LocalShell if cfg!(windows) => "Windows(Powershell)",
            Self::LocalShell => "Linux(Bash)",
            Self::WinRm => "Windows(Powershell)",
            Self::Ssh => "SSH",
        }
    }

    pub fn syntax(self) -> SyntaxLabel {
        match self {
            Self::LocalShell if cfg!(windows) => SyntaxLabel::Powershell,
            Self::LocalShell => SyntaxLabel::Bash,
            Self::WinRm => SyntaxLabel::Powershell,
            Self::Ssh => SyntaxLabel::Bash,
        }
    }
}
