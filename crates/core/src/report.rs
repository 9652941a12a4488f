//! Per-run bookkeeping turned into the wire-level [`RunSummary`].

use std::time::Duration;

use stepwise_protocol::{Locator, RunResult, RunSummary, StepReport, StepStatus};

use crate::chain::LocatorAttempt;

/// Outcome of a sequencer pass plus what happened at every attempted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
	pub result: RunResult,
	pub records: Vec<StepRecord>,
}

impl RunReport {
	/// Report for a run that stopped before any step was attempted.
	pub fn aborted(step: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			result: RunResult::aborted(step, reason),
			records: Vec::new(),
		}
	}

	/// Indices of attempted steps, in execution order.
	pub fn visited(&self) -> Vec<usize> {
		self.records.iter().map(|r| r.index).collect()
	}

	pub fn count(&self, status: StepStatus) -> usize {
		self.records.iter().filter(|r| r.status == status).count()
	}

	pub fn summary(&self, flow: &str, total: usize, duration: Duration) -> RunSummary {
		RunSummary {
			flow: flow.to_string(),
			result: self.result.clone(),
			steps: self.records.iter().map(StepRecord::to_report).collect(),
			executed: self.count(StepStatus::Succeeded),
			warned: self.count(StepStatus::Warned),
			total,
			duration_ms: duration.as_millis() as u64,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
	pub index: usize,
	pub label: String,
	pub status: StepStatus,
	pub locator: Option<Locator>,
	pub reason: Option<String>,
	pub attempts: Vec<LocatorAttempt>,
}

impl StepRecord {
	pub fn to_report(&self) -> StepReport {
		StepReport {
			index: self.index,
			label: self.label.clone(),
			status: self.status,
			locator: self.locator.as_ref().map(Locator::to_string),
			reason: self.reason.clone(),
			attempts: self.attempts.iter().map(LocatorAttempt::to_report).collect(),
		}
	}
}
