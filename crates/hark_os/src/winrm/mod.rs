//! Remote PowerShell over WinRM (WS-Management on port 5985).
//!
//! Each command authenticates one HTTP connection with NTLM, then seals every
//! SOAP message on it, so a stock listener with `AllowUnencrypted=false`
//! accepts the traffic.

pub mod encryption;
pub mod ntlm;
pub mod soap;

use crate::Executor;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hark_core::{Credentials, ExecutionOutcome, HarkError, Result, Secret};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use std::time::Duration;

use ntlm::{NtlmIdentity, SessionSecurity};
use soap::Envelope;

/// How long the server may hold a Receive before answering with a timeout fault.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(20);
/// Must outlast `OPERATION_TIMEOUT`.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// What came back for one SOAP request.
#[derive(Debug)]
enum Reply {
    Body(String),
    Fault(String),
}

pub struct WinRmClient {
    http: reqwest::Client,
    endpoint: String,
    identity: NtlmIdentity,
    password: Secret,
    envelope: Envelope,
    session_key: fn() -> [u8; 16],
}

impl WinRmClient {
    pub fn new(host: &str, port: u16, credentials: &Credentials) -> Result<Self> {
        // NTLM authenticates the TCP connection, so keep exactly one around.
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| HarkError::Transport(format!("failed to build WinRM client: {e}")))?;

        let endpoint = endpoint_url(host, port);
        Ok(Self {
            http,
            envelope: Envelope::new(endpoint.clone(), OPERATION_TIMEOUT),
            endpoint,
            identity: NtlmIdentity::parse(&credentials.username),
            password: credentials.password.clone(),
            session_key: rand::random,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// NTLM handshake with empty bodies. The returned channel is only good on
    /// the connection the handshake ran on.
    async fn authenticate(&self) -> Result<SealedChannel<'_>> {
        let negotiate = STANDARD.encode(ntlm::negotiate_message());
        let resp = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Negotiate {negotiate}"))
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| network_error(&self.endpoint, e))?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Err(HarkError::Transport(format!(
                "expected an NTLM challenge from {}, got HTTP {}",
                self.endpoint,
                resp.status()
            )));
        }
        let token = resp
            .headers()
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(challenge_token)
            .ok_or_else(|| {
                HarkError::Authentication(format!("{} did not offer NTLM", self.endpoint))
            })?;
        // Drain the body so the connection goes back to the pool for the next leg.
        let _ = resp.bytes().await;

        let raw = STANDARD
            .decode(token.as_bytes())
            .map_err(|e| HarkError::Authentication(format!("undecodable NTLM challenge: {e}")))?;
        let challenge = ntlm::parse_challenge(&raw)?;
        let client_challenge: [u8; 8] = rand::random();
        let authenticated = ntlm::authenticate_message(
            &self.identity,
            self.password.expose(),
            &challenge,
            client_challenge,
            (self.session_key)(),
        )?;

        let resp = self
            .http
            .post(&self.endpoint)
            .header(
                AUTHORIZATION,
                format!("Negotiate {}", STANDARD.encode(&authenticated.message)),
            )
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(|e| network_error(&self.endpoint, e))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(HarkError::Authentication(format!(
                "WinRM rejected credentials for {}",
                self.identity.user
            )));
        }
        if !status.is_success() {
            return Err(HarkError::Transport(format!(
                "WinRM handshake with {} ended with HTTP {status}",
                self.endpoint
            )));
        }
        let _ = resp.bytes().await;
        tracing::debug!("NTLM session established with {}", self.endpoint);

        Ok(SealedChannel {
            client: self,
            security: authenticated.security,
        })
    }

    /// Run a program in a fresh remote shell. The shell is deleted afterwards
    /// whether or not the command worked.
    pub async fn run_cmd(&self, command: &str, arguments: &[&str]) -> Result<ExecutionOutcome> {
        let mut channel = self.authenticate().await?;
        let shell_id = channel.open_shell().await?;
        tracing::debug!("WinRM shell {} opened on {}", shell_id, self.endpoint);

        let result = channel.run_in_shell(&shell_id, command, arguments).await;

        if let Err(e) = channel.close_shell(&shell_id).await {
            tracing::warn!("Failed to delete WinRM shell {}: {}", shell_id, e);
        }
        result
    }

    /// Run a PowerShell script; CLIXML on stderr is flattened to plain text.
    pub async fn run_ps(&self, script: &str) -> Result<ExecutionOutcome> {
        let encoded = soap::encode_powershell(script);
        let mut outcome = self
            .run_cmd("powershell", &["-encodedcommand", &encoded])
            .await?;
        outcome.stderr = soap::clean_clixml(&outcome.stderr);
        Ok(outcome)
    }
}

/// An authenticated connection. Requests go out one at a time because both
/// RC4 streams advance with every message.
struct SealedChannel<'a> {
    client: &'a WinRmClient,
    security: SessionSecurity,
}

impl SealedChannel<'_> {
    async fn send(&mut self, body: String) -> Result<Reply> {
        let client = self.client;
        let endpoint = client.endpoint.as_str();
        let (signature, sealed) = self.security.seal(body.as_bytes())?;
        let payload = encryption::wrap(body.len(), &signature, &sealed);

        let resp = client
            .http
            .post(endpoint)
            .header(CONTENT_TYPE, encryption::CONTENT_TYPE)
            .body(payload)
            .send()
            .await
            .map_err(|e| network_error(endpoint, e))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(HarkError::Authentication(format!(
                "{endpoint} no longer accepts the NTLM session"
            )));
        }
        let encrypted = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, encryption::is_encrypted);
        let raw = resp
            .bytes()
            .await
            .map_err(|e| HarkError::Transport(format!("failed to read WinRM response: {e}")))?;

        let text = if encrypted {
            let (signature, sealed) = encryption::unwrap(&raw)?;
            String::from_utf8_lossy(&self.security.unseal(signature, sealed)?).into_owned()
        } else {
            String::from_utf8_lossy(&raw).into_owned()
        };

        if status.is_success() {
            Ok(Reply::Body(text))
        } else if text.contains("Fault>") {
            Ok(Reply::Fault(text))
        } else {
            Err(HarkError::Transport(format!("WinRM returned HTTP {status}")))
        }
    }

    async fn send_expecting_body(&mut self, body: String) -> Result<String> {
        match self.send(body).await? {
            Reply::Body(xml) => Ok(xml),
            Reply::Fault(xml) => Err(fault_error(&xml)),
        }
    }

    async fn open_shell(&mut self) -> Result<String> {
        let client = self.client;
        let xml = self.send_expecting_body(client.envelope.create_shell()).await?;
        soap::parse_shell_id(&xml)
            .ok_or_else(|| HarkError::Transport("WinRM create response had no ShellId".into()))
    }

    async fn close_shell(&mut self, shell_id: &str) -> Result<()> {
        let client = self.client;
        self.send_expecting_body(client.envelope.delete_shell(shell_id))
            .await
            .map(|_| ())
    }

    async fn run_in_shell(
        &mut self,
        shell_id: &str,
        command: &str,
        arguments: &[&str],
    ) -> Result<ExecutionOutcome> {
        let client = self.client;
        let envelope = &client.envelope;
        let xml = self
            .send_expecting_body(envelope.command(shell_id, command, arguments))
            .await?;
        let command_id = soap::parse_command_id(&xml)
            .ok_or_else(|| HarkError::Transport("WinRM command response had no CommandId".into()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit_code = loop {
            match self.send(envelope.receive(shell_id, &command_id)).await? {
                Reply::Body(xml) => {
                    let chunk = soap::parse_receive(&xml);
                    stdout.extend_from_slice(&chunk.stdout);
                    stderr.extend_from_slice(&chunk.stderr);
                    if chunk.done {
                        break chunk.exit_code;
                    }
                }
                Reply::Fault(xml) if soap::is_operation_timeout(&xml) => {
                    tracing::debug!("WinRM receive timed out, polling again");
                }
                Reply::Fault(xml) => return Err(fault_error(&xml)),
            }
        };

        if let Err(e) = self
            .send_expecting_body(envelope.signal_terminate(shell_id, &command_id))
            .await
        {
            tracing::debug!("WinRM terminate signal failed: {}", e);
        }

        Ok(ExecutionOutcome::completed(
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr),
            exit_code,
        ))
    }
}

fn endpoint_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:{port}/wsman")
    } else {
        format!("http://{host}:{port}/wsman")
    }
}

/// Extract the base64 token from `Negotiate <token>` or `NTLM <token>`.
fn challenge_token(header: &str) -> Option<String> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("Negotiate") || scheme.eq_ignore_ascii_case("NTLM") {
        Some(token.to_string())
    } else {
        None
    }
}

fn network_error(endpoint: &str, e: reqwest::Error) -> HarkError {
    HarkError::Network(format!("WinRM request to {endpoint} failed: {e}"))
}

fn fault_error(xml: &str) -> HarkError {
    let message = soap::fault_message(xml).unwrap_or_else(|| "unknown WS-Management fault".into());
    HarkError::Transport(message)
}

// ============================================================================
// Executor
// ============================================================================

pub struct WinRmExecutor {
    host: String,
    client: WinRmClient,
}

impl WinRmExecutor {
    pub fn new(host: String, port: u16, credentials: Credentials) -> Result<Self> {
        let client = WinRmClient::new(&host, port, &credentials)?;
        Ok(Self { host, client })
    }
}

#[async_trait]
impl Executor for WinRmExecutor {
    async fn execute(&self, command: &str) -> Result<ExecutionOutcome> {
        tracing::debug!("Running PowerShell on {} via {}", self.host, self.client.endpoint());
        self.client.run_ps(command).await
    }

    fn name(&self) -> &str {
        "WinRmExecutor"
    }
}
