pub mod launcher;
pub mod local;
pub mod probe;
pub mod selector;
pub mod ssh;
pub mod winrm;

use async_trait::async_trait;
use hark_core::{ExecutionOutcome, Result};

pub use launcher::{AppLauncher, AppResolver, KnownAppTable, LaunchTarget, SystemLauncher};
pub use local::LocalExecutor;
pub use probe::{probe, Prober, TcpProber};
pub use selector::TransportSelector;
pub use ssh::{RusshConnector, SshConnector, SshExecutor, SshSession};
pub use winrm::WinRmExecutor;

/// Executor trait 定义了执行系统命令的能力
///
/// Implementors:
/// - `LocalExecutor`: 在本地 shell 中执行
/// - `WinRmExecutor`: 通过 WinRM (WS-Management) 远程执行 PowerShell
/// - `SshExecutor`: 通过 SSH 远程执行
///
/// Connection and authentication failures come back as `Err`; a command that
/// ran and failed comes back as an `ExecutionOutcome` with a non-zero exit code.
#[async_trait]
pub trait Executor: Send + Sync {
    /// 执行命令并返回捕获的输出
    async fn execute(&self, command: &str) -> Result<ExecutionOutcome>;

    /// 获取 Executor 类型名称 (用于日志)
    fn name(&self) -> &str;
}
