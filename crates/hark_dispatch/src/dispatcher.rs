use crate::executors::{ExecutorFactory, TransportExecutors};
use anyhow::Result;
use hark_core::{
    CommandResult, ExecutionOutcome, ExecutionRequest, HarkConfig, HarkError, LaunchResult, Report,
    TransportKind,
};
use hark_os::launcher::launch_phrase;
use hark_os::{AppResolver, SystemLauncher, TcpProber, TransportSelector};
use hark_reasoning::CommandGenerator;
use std::sync::Arc;
use std::time::Duration;

pub const UNREACHABLE_MESSAGE: &str = "Cannot establish connection to the target host";

/// Everything that happened for one request. `report` is what the user sees;
/// the other fields are there for callers and tests that need the raw values.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub transport: TransportKind,
    pub generated: Option<CommandResult>,
    pub execution: Option<ExecutionOutcome>,
    pub launch: Option<LaunchResult>,
    pub report: Report,
}

impl DispatchOutcome {
    fn new(transport: TransportKind) -> Self {
        Self {
            transport,
            generated: None,
            execution: None,
            launch: None,
            report: Report::new(),
        }
    }
}

/// The request pipeline: resolve local apps, pick a transport, generate a
/// command, run it under a deadline and report. On the local host a refused
/// "open <app>" request gets one more chance through the application search.
pub struct Dispatcher {
    selector: TransportSelector,
    generator: CommandGenerator,
    resolver: AppResolver,
    executors: Arc<dyn ExecutorFactory>,
    deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        selector: TransportSelector,
        generator: CommandGenerator,
        resolver: AppResolver,
        executors: Arc<dyn ExecutorFactory>,
        deadline: Duration,
    ) -> Self {
        Self {
            selector,
            generator,
            resolver,
            executors,
            deadline,
        }
    }

    /// Wire up the production collaborators from config.
    pub fn from_config(config: &HarkConfig) -> Result<Self> {
        let transport = &config.transport;
        let prober = Arc::new(TcpProber::new(transport.probe_timeout()));
        let selector = TransportSelector::with_ports(prober, transport.winrm_port, transport.ssh_port);
        let generator = CommandGenerator::from_config(&config.llm)?;
        let resolver = AppResolver::from_config(&config.apps, Arc::new(SystemLauncher));
        let executors = Arc::new(TransportExecutors::from_config(transport));
        Ok(Self::new(
            selector,
            generator,
            resolver,
            executors,
            transport.execution_deadline(),
        ))
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run one request to completion. Failures end up in the report; this
    /// never returns an error.
    pub async fn dispatch(&self, request: &ExecutionRequest) -> DispatchOutcome {
        tracing::info!("Dispatching request for host {}", request.host);
        let transport = self.selector.select(&request.host).await;
        let mut out = DispatchOutcome::new(transport);

        match transport {
            TransportKind::Local => {
                if self.launch_known_app(request, &mut out) {
                    return out;
                }
            }
            TransportKind::WinRm => {
                out.report.info("Detected WinRM (Windows)");
            }
            TransportKind::Ssh => {
                out.report.info("Detected SSH");
            }
            TransportKind::Unreachable => {
                out.report.error(UNREACHABLE_MESSAGE);
                return out;
            }
        }

        let Some(machine) = transport.machine_kind() else {
            return out;
        };

        let generated = match self.generator.generate(machine, &request.free_text).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Command generation failed: {}", e);
                out.report.failure(&e);
                return out;
            }
        };
        out.generated = Some(generated.clone());

        let Some(command) = generated.executable() else {
            if transport == TransportKind::Local && self.search_installed_app(request, &mut out).await {
                return out;
            }
            out.report.refusal(&generated);
            return out;
        };
        out.report.code(machine.syntax(), command);

        let executor = match self.executors.executor(transport, request) {
            Ok(executor) => executor,
            Err(e) => {
                out.report.failure(&e);
                return out;
            }
        };

        tracing::debug!("Executing via {} (deadline {:?})", executor.name(), self.deadline);
        match tokio::time::timeout(self.deadline, executor.execute(command)).await {
            Ok(Ok(outcome)) => {
                tracing::info!(
                    "{} finished: started={} exit_code={:?}",
                    executor.name(),
                    outcome.started,
                    outcome.exit_code
                );
                out.report.execution(transport, &outcome);
                out.execution = Some(outcome);
            }
            Ok(Err(e)) => {
                tracing::warn!("{} failed ({}): {}", executor.name(), e.kind(), e);
                out.report.failure(&e);
            }
            Err(_) => {
                let e = HarkError::DeadlineExceeded(self.deadline);
                tracing::warn!("{} abandoned: {}", executor.name(), e);
                out.report.failure(&e);
            }
        }
        out
    }

    /// Keyword table only. Returns true when an app was (or failed to be)
    /// launched and the request is done.
    fn launch_known_app(&self, request: &ExecutionRequest, out: &mut DispatchOutcome) -> bool {
        let Some(result) = self.resolver.resolve_and_launch(&request.free_text) else {
            return false;
        };
        if let Some(app) = &result.app {
            out.report.info(format!("Detected a local app command, launching '{}'", app));
        }
        out.report.launch(&result);
        out.launch = Some(result);
        true
    }

    /// Filesystem search for a refused launch phrase. Returns true when the
    /// app was found, whether or not it started.
    async fn search_installed_app(&self, request: &ExecutionRequest, out: &mut DispatchOutcome) -> bool {
        let Some(app) = launch_phrase(&request.free_text) else {
            return false;
        };
        out.report.info(format!("Searching for '{}'", app));
        let result = self.resolver.search_and_launch(&app).await;
        let found = result.launched || result.path.is_some();
        if found {
            out.report.launch(&result);
        } else if let Some(reason) = &result.error {
            out.report.info(reason.clone());
        }
        out.launch = Some(result);
        found
    }
}
