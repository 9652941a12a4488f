//! Wire types shared by the stepwise engine, its runtime adapters and the CLI.
//!
//! Everything here is plain data with serde support:
//!
//! - [`Locator`] - one candidate way of finding an on-screen control
//! - [`FlowFile`] - the JSON document describing a guided run
//! - [`RunResult`] / [`RunSummary`] - what a run reports when it ends

pub mod flow;
pub mod locator;
pub mod summary;

pub use flow::{ActionSpec, AgentSpec, BrowserKind, CheckpointSpec, FailurePolicy, FlowFile, GateSpec, StepDefaults, StepSpec};
pub use locator::Locator;
pub use summary::{AttemptReport, RunResult, RunSummary, StepReport, StepStatus};
