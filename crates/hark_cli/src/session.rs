use anyhow::{Context, Result};
use hark_core::{Credentials, ExecutionRequest, Secret};
use std::io::{self, BufRead, Write};

/// Target and credentials, checked once before anything runs.
#[derive(Debug, Clone)]
pub struct Session {
    host: String,
    credentials: Credentials,
}

impl Session {
    /// All three values must be non-empty.
    pub fn new(host: &str, username: &str, password: Secret) -> Result<Self> {
        let host = host.trim();
        let username = username.trim();
        if host.is_empty() || username.is_empty() || password.is_empty() {
            anyhow::bail!("host, username and password are all required");
        }
        Ok(Self {
            host: host.to_string(),
            credentials: Credentials::new(username, password),
        })
    }

    /// Fill in whatever the flags left out by asking on the terminal.
    /// The password comes from `HARK_PASSWORD` or a masked prompt.
    pub fn gather(host: Option<String>, username: Option<String>) -> Result<Self> {
        let host = match host {
            Some(h) => h,
            None => ask("Target host (IP or hostname)", Some("localhost"))?,
        };
        let username = match username {
            Some(u) => u,
            None => ask("Username", None)?,
        };
        let password = match std::env::var("HARK_PASSWORD") {
            Ok(p) if !p.is_empty() => p,
            _ => rpassword::prompt_password("Password: ").context("failed to read password")?,
        };
        Self::new(&host, &username, Secret::from(password))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn request(&self, text: &str) -> ExecutionRequest {
        ExecutionRequest::new(text.trim(), self.host.clone(), self.credentials.clone())
    }
}

fn ask(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} [{}]: ", label, d),
        None => print!("{}: ", label),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim();
    Ok(match (value.is_empty(), default) {
        (true, Some(d)) => d.to_string(),
        _ => value.to_string(),
    })
}
