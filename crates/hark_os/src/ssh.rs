use crate::Executor;
use async_trait::async_trait;
use hark_core::{Credentials, ExecutionOutcome, HarkError, Result};
use russh::*;
use russh_keys::*;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Connection seam
// ============================================================================

/// An authenticated SSH connection owned by exactly one `execute` call.
#[async_trait]
pub trait SshSession: Send {
    /// Run `command` non-interactively and collect both streams to completion.
    async fn exec(&mut self, command: &str) -> Result<ExecutionOutcome>;

    /// Tear the connection down.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait SshConnector: Send + Sync {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<Box<dyn SshSession>>;
}

// ============================================================================
// russh implementation
// ============================================================================

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // 不做 host key pinning：任何未知主机的 key 都接受
        Ok(true)
    }
}

#[derive(Debug, Clone)]
pub struct RusshConnector {
    inactivity_timeout: Option<Duration>,
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self {
            inactivity_timeout: Some(Duration::from_secs(300)),
        }
    }
}

#[async_trait]
impl SshConnector for RusshConnector {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<Box<dyn SshSession>> {
        let config = Arc::new(client::Config {
            inactivity_timeout: self.inactivity_timeout,
            ..Default::default()
        });

        // russh::client::connect handles the TCP connection itself
        let mut handle = client::connect(config, (host, port), ClientHandler)
            .await
            .map_err(|e| HarkError::Network(format!("SSH connect to {host}:{port} failed: {e}")))?;

        let authenticated = handle
            .authenticate_password(
                credentials.username.as_str(),
                credentials.password.expose(),
            )
            .await
            .map_err(|e| HarkError::Authentication(format!("SSH password auth error: {e}")))?;

        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await;
            return Err(HarkError::Authentication(format!(
                "SSH server rejected password for {}@{}",
                credentials.username, host
            )));
        }

        tracing::debug!("SSH session established to {}@{}:{}", credentials.username, host, port);
        Ok(Box::new(RusshSession { handle }))
    }
}

struct RusshSession {
    handle: client::Handle<ClientHandler>,
}

#[async_trait]
impl SshSession for RusshSession {
    async fn exec(&mut self, command: &str) -> Result<ExecutionOutcome> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| HarkError::Transport(format!("failed to open SSH channel: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| HarkError::Transport(format!("SSH exec failed: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => {
                    stdout.extend_from_slice(data);
                }
                ChannelMsg::ExtendedData { ref data, .. } => {
                    stderr.extend_from_slice(data);
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exit_code = Some(exit_status as i32);
                }
                _ => {}
            }
        }

        Ok(ExecutionOutcome::completed(
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr),
            exit_code,
        ))
    }

    async fn close(&mut self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|e| HarkError::Transport(format!("SSH disconnect failed: {e}")))
    }
}

// ============================================================================
// Executor
// ============================================================================

pub struct SshExecutor {
    host: String,
    port: u16,
    credentials: Credentials,
    connector: Arc<dyn SshConnector>,
}

impl SshExecutor {
    pub fn new(host: String, port: u16, credentials: Credentials) -> Self {
        Self::with_connector(host, port, credentials, Arc::new(RusshConnector::default()))
    }

    pub fn with_connector(
        host: String,
        port: u16,
        credentials: Credentials,
        connector: Arc<dyn SshConnector>,
    ) -> Self {
        Self {
            host,
            port,
            credentials,
            connector,
        }
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn execute(&self, command: &str) -> Result<ExecutionOutcome> {
        let mut session = self
            .connector
            .connect(&self.host, self.port, &self.credentials)
            .await?;

        let result = session.exec(command).await;

        // The connection goes away whether or not the command worked.
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close SSH session to {}: {}", self.host, e);
        }

        result
    }

    fn name(&self) -> &str {
        "SshExecutor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Counters {
        connects: AtomicUsize,
        execs: AtomicUsize,
        closes: AtomicUsize,
        last_user: Mutex<Option<String>>,
    }

    struct FakeSession {
        counters: Arc<Counters>,
        fail_exec: bool,
    }

    #[async_trait]
    impl SshSession for FakeSession {
        async fn exec(&mut self, command: &str) -> Result<ExecutionOutcome> {
            self.counters.execs.fetch_add(1, Ordering::SeqCst);
            if self.fail_exec {
                return Err(HarkError::Transport("channel closed unexpectedly".into()));
            }
            Ok(ExecutionOutcome::completed(format!("ran: {command}"), "", Some(0)))
        }

        async fn close(&mut self) -> Result<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeConnector {
        counters: Arc<Counters>,
        fail_exec: bool,
        reject_auth: bool,
    }

    #[async_trait]
    impl SshConnector for FakeConnector {
        async fn connect(
            &self,
            _host: &str,
            _port: u16,
            credentials: &Credentials,
        ) -> Result<Box<dyn SshSession>> {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            *self.counters.last_user.lock().unwrap() = Some(credentials.username.clone());
            if self.reject_auth {
                return Err(HarkError::Authentication("rejected".into()));
            }
            Ok(Box::new(FakeSession {
                counters: self.counters.clone(),
                fail_exec: self.fail_exec,
            }))
        }
    }

    fn executor(fail_exec: bool, reject_auth: bool) -> (SshExecutor, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let connector = Arc::new(FakeConnector {
            counters: counters.clone(),
            fail_exec,
            reject_auth,
        });
        let exec = SshExecutor::with_connector(
            "10.0.0.7".into(),
            22,
            Credentials::new("deploy", "pw"),
            connector,
        );
        (exec, counters)
    }

    #[tokio::test]
    async fn test_closes_after_success() {
        let (exec, counters) = executor(false, false);
        let out = exec.execute("uname -a").await.unwrap();
        assert_eq!(out.stdout, "ran: uname -a");
        assert_eq!(counters.execs.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.last_user.lock().unwrap().as_deref(), Some("deploy"));
    }

    #[tokio::test]
    async fn test_closes_after_exec_failure() {
        let (exec, counters) = executor(true, false);
        let err = exec.execute("uname -a").await.unwrap_err();
        assert!(matches!(err, HarkError::Transport(_)));
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_never_execs() {
        let (exec, counters) = executor(false, true);
        let err = exec.execute("uname -a").await.unwrap_err();
        assert!(matches!(err, HarkError::Authentication(_)));
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(counters.execs.load(Ordering::SeqCst), 0);
    }
}
