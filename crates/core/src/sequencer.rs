//! The step sequencer state machine.
//!
//! ```text
//! NotStarted -> Running(0) -> Running(1) -> ... -> Completed | CompletedWithWarnings
//!                    |  ^
//!                    v  |  (checkpoint at i, before step i)
//!              AwaitingGate(i)
//! any Running(i) / AwaitingGate(i) -> Aborted
//! ```
//!
//! Steps run strictly in order, once each. A failed step is skipped only when its
//! chain was exhausted and its policy is `warn-and-continue`; everything else aborts.

use stepwise_protocol::{FailurePolicy, RunResult, StepStatus};
use tracing::{error, info, warn};

use crate::agent::AgentHandle;
use crate::events::{EventSink, RunEvent};
use crate::gate::{GateMode, ManualGate};
use crate::interrupt::Interrupt;
use crate::report::{RunReport, StepRecord};
use crate::resolver::{StepFailure, StepOutcome, StepResolver};
use crate::sequence::Sequence;
use crate::step::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
	NotStarted,
	Running(usize),
	/// Blocked on the checkpoint(s) attached before step `i`.
	AwaitingGate(usize),
	Completed,
	CompletedWithWarnings,
	Aborted,
}

/// Drives one pass over a [`Sequence`].
pub struct StepSequencer<'a> {
	sequence: &'a Sequence,
	resolver: StepResolver,
	gate: &'a ManualGate,
	sink: &'a dyn EventSink,
	interrupt: Interrupt,
	state: SequencerState,
}

impl<'a> StepSequencer<'a> {
	pub fn new(sequence: &'a Sequence, resolver: StepResolver, gate: &'a ManualGate, sink: &'a dyn EventSink) -> Self {
		Self {
			sequence,
			resolver,
			gate,
			sink,
			interrupt: Interrupt::default(),
			state: SequencerState::NotStarted,
		}
	}

	pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
		self.interrupt = interrupt;
		self
	}

	pub fn state(&self) -> SequencerState {
		self.state
	}

	/// Position the sequencer was working on, if it got that far.
	pub fn position(&self) -> Option<usize> {
		match self.state {
			SequencerState::Running(i) | SequencerState::AwaitingGate(i) => Some(i),
			_ => None,
		}
	}

	pub async fn run(&mut self, agent: &dyn AgentHandle) -> RunReport {
		debug_assert_eq!(self.state, SequencerState::NotStarted, "a sequencer runs once");

		let sequence = self.sequence;
		let total = sequence.len();
		let mut records = Vec::with_capacity(total);
		let mut warnings = Vec::new();

		for position in 0..=total {
			// past the last step only a trailing checkpoint is left to interrupt
			let work_left = position < total || sequence.checkpoints_at(position).next().is_some();
			if work_left && self.interrupt.is_triggered() {
				warn!(target = "stepwise", position, "run interrupted by operator");
				self.sink.emit(&RunEvent::Interrupted { position });
				return self.abort(records, sequence.label_at(position), "interrupted by operator");
			}

			for checkpoint in sequence.checkpoints_at(position) {
				self.state = SequencerState::AwaitingGate(position);
				info!(target = "stepwise", position, instruction = %checkpoint.instruction, "checkpoint reached");
				self.sink.emit(&RunEvent::CheckpointReached {
					position,
					instruction: checkpoint.instruction.clone(),
					blocking: checkpoint.mode == GateMode::BlockOnHumanSignal,
				});

				let outcome = self.gate.wait(checkpoint, &self.interrupt).await;
				self.sink.emit(&RunEvent::CheckpointCleared { position, outcome });
				if !outcome.is_cleared() {
					return self.abort(records, sequence.label_at(position), "aborted by operator at checkpoint");
				}
			}

			let Some(step) = sequence.steps().get(position) else {
				break;
			};

			self.state = SequencerState::Running(position);
			info!(target = "stepwise", index = position, step = step.label(), "step started");
			self.sink.emit(&RunEvent::StepStarted {
				index: position,
				total,
				label: step.label().to_string(),
				action: step.action().describe(),
			});

			match self.resolver.execute(step, agent).await {
				StepOutcome::Succeeded(success) => {
					info!(target = "stepwise", index = position, locator = %success.locator, "step succeeded");
					self.sink.emit(&RunEvent::StepSucceeded {
						index: position,
						label: step.label().to_string(),
						locator: success.locator.to_string(),
					});
					records.push(StepRecord {
						index: position,
						label: step.label().to_string(),
						status: StepStatus::Succeeded,
						locator: Some(success.locator),
						reason: None,
						attempts: success.attempts,
					});
				}
				StepOutcome::Failed(failure) if failure.is_recoverable() && step.policy() == FailurePolicy::WarnAndContinue => {
					warn!(target = "stepwise", index = position, step = step.label(), reason = %failure, "step failed, continuing");
					self.sink.emit(&RunEvent::StepWarned {
						index: position,
						label: step.label().to_string(),
						reason: failure.to_string(),
						attempts: describe_attempts(&failure),
					});
					warnings.push(step.label().to_string());
					records.push(failed_record(position, step, StepStatus::Warned, &failure));
				}
				StepOutcome::Failed(failure) => {
					error!(target = "stepwise", index = position, step = step.label(), reason = %failure, "step failed, aborting");
					self.sink.emit(&RunEvent::StepAborted {
						index: position,
						label: step.label().to_string(),
						reason: failure.to_string(),
						attempts: describe_attempts(&failure),
					});
					records.push(failed_record(position, step, StepStatus::Aborted, &failure));
					return self.abort(records, step.label(), failure.to_string());
				}
			}

			if sequence.health_checks() {
				if let Err(err) = agent.check_health().await {
					error!(target = "stepwise", index = position, error = %err, "agent failed health check");
					return self.abort(records, step.label(), format!("health check failed: {err}"));
				}
			}
		}

		let result = if warnings.is_empty() {
			self.state = SequencerState::Completed;
			RunResult::Completed
		} else {
			self.state = SequencerState::CompletedWithWarnings;
			RunResult::CompletedWithWarnings { warnings }
		};

		RunReport { result, records }
	}

	fn abort(&mut self, records: Vec<StepRecord>, label: &str, reason: impl Into<String>) -> RunReport {
		self.state = SequencerState::Aborted;
		RunReport {
			result: RunResult::aborted(label, reason),
			records,
		}
	}
}

fn failed_record(index: usize, step: &Step, status: StepStatus, failure: &StepFailure) -> StepRecord {
	StepRecord {
		index,
		label: step.label().to_string(),
		status,
		locator: match failure {
			StepFailure::Action { locator, .. } => Some(locator.clone()),
			_ => None,
		},
		reason: Some(failure.to_string()),
		attempts: failure.attempts().to_vec(),
	}
}

fn describe_attempts(failure: &StepFailure) -> Vec<String> {
	failure
		.attempts()
		.iter()
		.map(|a| format!("{} -> {} ({} ms)", a.locator, a.outcome, a.elapsed.as_millis()))
		.collect()
}
