//! Owns the agent session for a whole run and guarantees its teardown.
//!
//! Every path out of a run, whether success, abort, session failure or a panic
//! inside the engine, reaches the same place: the summary is reported, the teardown
//! gate is held, then the session is closed exactly once.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use stepwise_protocol::RunSummary;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::agent::{AgentHandle, Driver};
use crate::events::{EventSink, NullSink, RunEvent};
use crate::gate::{Checkpoint, GateMode, GateOutcome, ManualGate};
use crate::interrupt::Interrupt;
use crate::report::RunReport;
use crate::resolver::{ResolverConfig, StepResolver};
use crate::sequence::Sequence;
use crate::sequencer::{SequencerState, StepSequencer};
use crate::session::Session;

/// Step label used when the agent never launched.
pub const OPEN_SESSION: &str = "open session";
/// Step label used when entry navigation failed.
pub const NAVIGATE: &str = "navigate";

const TEARDOWN_INSTRUCTION: &str = "Inspect the agent, then press ENTER to close it";

/// Runs sequences inside a guarded session.
pub struct SessionRecoveryHandler {
	driver: Box<dyn Driver>,
	gate: ManualGate,
	sink: Arc<dyn EventSink>,
	resolver: ResolverConfig,
	interrupt: Interrupt,
	teardown: Checkpoint,
}

impl SessionRecoveryHandler {
	pub fn new(driver: Box<dyn Driver>) -> Self {
		Self {
			driver,
			gate: ManualGate::unattended(),
			sink: Arc::new(NullSink),
			resolver: ResolverConfig::default(),
			interrupt: Interrupt::default(),
			teardown: Checkpoint::blocking(TEARDOWN_INSTRUCTION),
		}
	}

	pub fn gate(mut self, gate: ManualGate) -> Self {
		self.gate = gate;
		self
	}

	pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.sink = sink;
		self
	}

	pub fn resolver(mut self, config: ResolverConfig) -> Self {
		self.resolver = config;
		self
	}

	pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
		self.interrupt = interrupt;
		self
	}

	/// Replaces the gate held between the summary and the close.
	pub fn teardown(mut self, checkpoint: Checkpoint) -> Self {
		self.teardown = checkpoint;
		self
	}

	/// Opens a session, runs `sequence` in it and always tears the session down.
	pub async fn run_guarded(&self, sequence: &Sequence) -> RunSummary {
		let started = Instant::now();
		let driver = self.driver.name().to_string();

		self.sink.emit(&RunEvent::SessionOpening { driver: driver.clone() });
		let session = match Session::open(self.driver.as_ref()).await {
			Ok(session) => session,
			Err(err) => {
				error!(target = "stepwise", driver = %driver, error = %err, "session failed to open");
				self.sink.emit(&RunEvent::SessionFailed { error: err.to_string() });
				let report = RunReport::aborted(OPEN_SESSION, format!("session failure: {err}"));
				return self.finish(sequence, &report, started);
			}
		};
		self.sink.emit(&RunEvent::SessionOpened { driver });

		let mut sequencer = StepSequencer::new(sequence, StepResolver::new(self.resolver), &self.gate, self.sink.as_ref())
			.with_interrupt(self.interrupt.clone());

		let guarded = AssertUnwindSafe(self.drive(session.agent(), sequence, &mut sequencer))
			.catch_unwind()
			.await;

		let report = match guarded {
			Ok(report) => report,
			Err(panic) => {
				let label = match sequencer.state() {
					SequencerState::NotStarted => NAVIGATE,
					_ => sequencer.position().map_or(sequence.label_at(sequence.len()), |p| sequence.label_at(p)),
				};
				let reason = format!("unexpected failure: {}", panic_message(panic.as_ref()));
				error!(target = "stepwise", step = label, reason = %reason, "run panicked");
				RunReport::aborted(label, reason)
			}
		};

		let summary = self.finish(sequence, &report, started);
		self.close(session).await;
		summary
	}

	async fn drive(&self, agent: &dyn AgentHandle, sequence: &Sequence, sequencer: &mut StepSequencer<'_>) -> RunReport {
		if let Some(target) = sequence.entry() {
			info!(target = "stepwise", entry = target, "navigating");
			self.sink.emit(&RunEvent::Navigating { target: target.to_string() });
			if let Err(err) = agent.navigate(target).await {
				error!(target = "stepwise", entry = target, error = %err, "navigation failed");
				let reason = if err.is_session_lost() {
					format!("session failure: {err}")
				} else {
					format!("navigation failed: {err}")
				};
				return RunReport::aborted(NAVIGATE, reason);
			}
		}

		let warmup = sequence.warmup();
		if !warmup.is_zero() {
			debug!(target = "stepwise", wait_ms = warmup.as_millis() as u64, "warming up");
			self.sink.emit(&RunEvent::WarmingUp { wait: warmup });
			sleep(warmup).await;
		}

		sequencer.run(agent).await
	}

	fn finish(&self, sequence: &Sequence, report: &RunReport, started: Instant) -> RunSummary {
		let summary = report.summary(sequence.name(), sequence.len(), started.elapsed());
		info!(
			target = "stepwise",
			flow = sequence.name(),
			status = summary.result.status(),
			executed = summary.executed,
			warned = summary.warned,
			total = summary.total,
			"run finished"
		);
		self.sink.emit(&RunEvent::RunFinished { summary: summary.clone() });
		summary
	}

	/// Holds the teardown gate, then closes. Neither a gate abort nor a panicking
	/// signal channel skips the close.
	async fn close(&self, session: Session) {
		self.sink.emit(&RunEvent::AwaitingTeardown {
			blocking: self.teardown.mode == GateMode::BlockOnHumanSignal,
			fallback: self.gate.fallback(),
		});

		let held = AssertUnwindSafe(self.gate.wait(&self.teardown, &self.interrupt))
			.catch_unwind()
			.await;
		match held {
			Ok(GateOutcome::Aborted) => debug!(target = "stepwise", "teardown gate aborted, closing now"),
			Ok(outcome) => debug!(target = "stepwise", ?outcome, "teardown gate cleared"),
			Err(panic) => warn!(target = "stepwise", reason = panic_message(panic.as_ref()), "teardown gate panicked"),
		}

		match session.close().await {
			Ok(()) => {
				info!(target = "stepwise", "session closed");
				self.sink.emit(&RunEvent::SessionClosed);
			}
			Err(err) => {
				warn!(target = "stepwise", error = %err, "failed to close session");
				self.sink.emit(&RunEvent::SessionCloseFailed { error: err.to_string() });
			}
		}
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message
	} else {
		"panic"
	}
}
