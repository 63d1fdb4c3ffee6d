use hark_core::config::TransportConfig;
use hark_core::{ExecutionRequest, HarkError, Result, TransportKind};
use hark_os::{Executor, LocalExecutor, SshExecutor, WinRmExecutor};

/// Builds the executor for a selected transport. One executor per request;
/// nothing is pooled.
pub trait ExecutorFactory: Send + Sync {
    fn executor(&self, transport: TransportKind, request: &ExecutionRequest) -> Result<Box<dyn Executor>>;
}

/// The real transports: local shell, WinRM and SSH.
#[derive(Debug, Clone)]
pub struct TransportExecutors {
    winrm_port: u16,
    ssh_port: u16,
}

impl Default for TransportExecutors {
    fn default() -> Self {
        Self::from_config(&TransportConfig::default())
    }
}

impl TransportExecutors {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            winrm_port: config.winrm_port,
            ssh_port: config.ssh_port,
        }
    }
}

impl ExecutorFactory for TransportExecutors {
    fn executor(&self, transport: TransportKind, request: &ExecutionRequest) -> Result<Box<dyn Executor>> {
        match transport {
            TransportKind::Local => Ok(Box::new(LocalExecutor::new())),
            TransportKind::WinRm => Ok(Box::new(WinRmExecutor::new(
                request.host.clone(),
                self.winrm_port,
                request.credentials.clone(),
            )?)),
            TransportKind::Ssh => Ok(Box::new(SshExecutor::new(
                request.host.clone(),
                self.ssh_port,
                request.credentials.clone(),
            ))),
            TransportKind::Unreachable => Err(HarkError::Network(format!(
                "no transport available for {}",
                request.host
            ))),
        }
    }
}
