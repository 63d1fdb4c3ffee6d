//! Shared vocabulary for hark: the request/outcome data model, the error
//! taxonomy, configuration and the result reporter.

pub mod config;
pub mod error;
pub mod outcome;
pub mod report;
pub mod request;

pub use config::HarkConfig;
pub use error::{HarkError, Result};
pub use outcome::{CommandResult, ExecutionOutcome, LaunchResult};
pub use report::{Entry, Level, Report, SyntaxLabel};
pub use request::{is_localhost, Credentials, ExecutionRequest, MachineKind, Secret, TransportKind};
