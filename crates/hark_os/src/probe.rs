//! TCP reachability probing.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Single best-effort connect attempt. Refused, unresolvable and slow hosts
/// all read as closed.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            tracing::debug!("probe {}:{} open", host, port);
            true
        }
        Ok(Err(e)) => {
            tracing::debug!("probe {}:{} closed: {}", host, port, e);
            false
        }
        Err(_) => {
            tracing::debug!("probe {}:{} timed out after {:?}", host, port, timeout);
            false
        }
    }
}

#[async_trait]
pub trait Prober: Send + Sync {
    async fn is_open(&self, host: &str, port: u16) -> bool;
}

#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn is_open(&self, host: &str, port: u16) -> bool {
        probe(host, port, self.timeout).await
    }
}
