//! The hark request pipeline.
//!
//! text → Local Application Resolver (local host) or Transport Selector →
//! Command Generator → Transport Executor → Report.

pub mod dispatcher;
pub mod executors;

pub use dispatcher::{DispatchOutcome, Dispatcher, UNREACHABLE_MESSAGE};
pub use executors::{ExecutorFactory, TransportExecutors};
