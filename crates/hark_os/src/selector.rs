use crate::probe::Prober;
use hark_core::{is_localhost, TransportKind};
use std::sync::Arc;

/// Picks the transport for a host: localhost runs locally, otherwise WinRM is
/// tried before SSH. The order is fixed.
pub struct TransportSelector {
    prober: Arc<dyn Prober>,
    winrm_port: u16,
    ssh_port: u16,
}

impl TransportSelector {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self::with_ports(prober, 5985, 22)
    }

    pub fn with_ports(prober: Arc<dyn Prober>, winrm_port: u16, ssh_port: u16) -> Self {
        Self {
            prober,
            winrm_port,
            ssh_port,
        }
    }

    pub fn winrm_port(&self) -> u16 {
        self.winrm_port
    }

    pub fn ssh_port(&self) -> u16 {
        self.ssh_port
    }

    pub async fn select(&self, host: &str) -> TransportKind {
        if is_localhost(host) {
            return TransportKind::Local;
        }
        let host = host.trim();

        let kind = if self.prober.is_open(host, self.winrm_port).await {
            TransportKind::WinRm
        } else if self.prober.is_open(host, self.ssh_port).await {
            TransportKind::Ssh
        } else {
            TransportKind::Unreachable
        };
        tracing::info!("Selected transport {} for {}", kind, host);
        kind
    }
}
