//! Progress events emitted while a run advances.
//!
//! The engine never prints. Front-ends implement [`EventSink`] to turn events into
//! console lines; the engine itself only logs through `tracing`.

use std::time::Duration;

use stepwise_protocol::RunSummary;

use crate::gate::GateOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
	SessionOpening {
		driver: String,
	},
	SessionOpened {
		driver: String,
	},
	SessionFailed {
		error: String,
	},
	Navigating {
		target: String,
	},
	WarmingUp {
		wait: Duration,
	},
	CheckpointReached {
		position: usize,
		instruction: String,
		blocking: bool,
	},
	CheckpointCleared {
		position: usize,
		outcome: GateOutcome,
	},
	StepStarted {
		index: usize,
		total: usize,
		label: String,
		action: String,
	},
	StepSucceeded {
		index: usize,
		label: String,
		locator: String,
	},
	/// A `warn-and-continue` step failed; the run goes on.
	StepWarned {
		index: usize,
		label: String,
		reason: String,
		attempts: Vec<String>,
	},
	StepAborted {
		index: usize,
		label: String,
		reason: String,
		attempts: Vec<String>,
	},
	Interrupted {
		position: usize,
	},
	/// Emitted once per run, before the teardown gate.
	RunFinished {
		summary: RunSummary,
	},
	AwaitingTeardown {
		blocking: bool,
		fallback: Duration,
	},
	SessionClosed,
	SessionCloseFailed {
		error: String,
	},
}

pub trait EventSink: Send + Sync {
	fn emit(&self, event: &RunEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
	fn emit(&self, _event: &RunEvent) {}
}
