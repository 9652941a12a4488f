//! Checkpoints and the manual gate that holds a run until a human acts.
//!
//! A gate must never deadlock when nobody is there to answer: blocking checkpoints
//! fall back to a bounded wait whenever the human-signal channel is not interactive
//! or closes while we wait on it.

use std::time::Duration;

use async_trait::async_trait;
use stepwise_protocol::GateSpec;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::interrupt::Interrupt;

/// Fallback wait used when a blocking gate has no interactive channel.
pub const DEFAULT_FALLBACK_WAIT: Duration = Duration::from_secs(60);

/// How a checkpoint waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
	/// Sleep for the duration, then clear unconditionally.
	BoundedWait(Duration),
	/// Wait for an explicit acknowledgment.
	BlockOnHumanSignal,
}

impl From<GateSpec> for GateMode {
	fn from(spec: GateSpec) -> Self {
		match spec {
			GateSpec::BoundedWait { ms } => GateMode::BoundedWait(Duration::from_millis(ms)),
			GateSpec::BlockOnHumanSignal => GateMode::BlockOnHumanSignal,
		}
	}
}

/// A point in the sequence that needs human judgment (CAPTCHA, email verification).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
	pub instruction: String,
	pub mode: GateMode,
}

impl Checkpoint {
	pub fn new(instruction: impl Into<String>, mode: GateMode) -> Self {
		Self {
			instruction: instruction.into(),
			mode,
		}
	}

	pub fn blocking(instruction: impl Into<String>) -> Self {
		Self::new(instruction, GateMode::BlockOnHumanSignal)
	}

	pub fn bounded(instruction: impl Into<String>, wait: Duration) -> Self {
		Self::new(instruction, GateMode::BoundedWait(wait))
	}
}

/// Reply read from the human-signal channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
	Continue,
	Abort,
	/// The channel closed before anyone answered (EOF).
	Closed,
}

/// Channel through which a human acknowledges checkpoints.
#[async_trait]
pub trait HumanSignal: Send + Sync {
	/// Whether a human can answer at all.
	fn is_interactive(&self) -> bool;

	/// Shows `prompt` and blocks until the human replies or the channel closes.
	async fn wait_for_signal(&self, prompt: &str) -> Signal;
}

/// Signal channel for unattended runs: never interactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

#[async_trait]
impl HumanSignal for Unattended {
	fn is_interactive(&self) -> bool {
		false
	}

	async fn wait_for_signal(&self, _prompt: &str) -> Signal {
		Signal::Closed
	}
}

/// How a gate cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
	/// A human said continue.
	Acknowledged,
	/// The bounded wait expired; the designed degrade path, not an error.
	TimedOut,
	/// A human asked to stop the run.
	Aborted,
}

impl GateOutcome {
	pub fn is_cleared(self) -> bool {
		!matches!(self, GateOutcome::Aborted)
	}
}

/// Holds the run at checkpoints.
pub struct ManualGate {
	signal: Box<dyn HumanSignal>,
	fallback: Duration,
}

impl ManualGate {
	pub fn new(signal: Box<dyn HumanSignal>) -> Self {
		Self {
			signal,
			fallback: DEFAULT_FALLBACK_WAIT,
		}
	}

	pub fn unattended() -> Self {
		Self::new(Box::new(Unattended))
	}

	/// Bounded wait substituted for blocking gates without a human.
	pub fn with_fallback(mut self, fallback: Duration) -> Self {
		self.fallback = fallback;
		self
	}

	pub fn fallback(&self) -> Duration {
		self.fallback
	}

	pub fn is_interactive(&self) -> bool {
		self.signal.is_interactive()
	}

	/// Holds `checkpoint`. An operator interrupt during the wait aborts it,
	/// whatever the gate mode.
	pub async fn wait(&self, checkpoint: &Checkpoint, interrupt: &Interrupt) -> GateOutcome {
		tokio::select! {
			outcome = self.hold(checkpoint) => outcome,
			() = interrupt.triggered() => {
				info!(target = "stepwise", "gate interrupted by operator");
				GateOutcome::Aborted
			}
		}
	}

	async fn hold(&self, checkpoint: &Checkpoint) -> GateOutcome {
		match checkpoint.mode {
			GateMode::BoundedWait(duration) => {
				debug!(target = "stepwise", wait_ms = duration.as_millis() as u64, "bounded gate");
				sleep(duration).await;
				GateOutcome::TimedOut
			}
			GateMode::BlockOnHumanSignal if !self.signal.is_interactive() => {
				info!(
					target = "stepwise",
					wait_ms = self.fallback.as_millis() as u64,
					"no interactive channel, using bounded fallback"
				);
				sleep(self.fallback).await;
				GateOutcome::TimedOut
			}
			GateMode::BlockOnHumanSignal => match self.signal.wait_for_signal(&checkpoint.instruction).await {
				Signal::Continue => GateOutcome::Acknowledged,
				Signal::Abort => GateOutcome::Aborted,
				Signal::Closed => {
					info!(
						target = "stepwise",
						wait_ms = self.fallback.as_millis() as u64,
						"signal channel closed, using bounded fallback"
					);
					sleep(self.fallback).await;
					GateOutcome::TimedOut
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use std::collections::VecDeque;
	use std::sync::Arc;

	use parking_lot::Mutex;
	use tokio::time::Instant;

	use super::*;

	fn assert_near(actual: Duration, expected: Duration) {
		assert!(
			actual >= expected && actual < expected + Duration::from_millis(5),
			"expected ~{expected:?}, got {actual:?}"
		);
	}

	struct Scripted {
		interactive: bool,
		replies: Mutex<VecDeque<Signal>>,
		prompts: Arc<Mutex<Vec<String>>>,
	}

	impl Scripted {
		fn new(interactive: bool, replies: &[Signal]) -> (Self, Arc<Mutex<Vec<String>>>) {
			let prompts = Arc::new(Mutex::new(Vec::new()));
			let scripted = Self {
				interactive,
				replies: Mutex::new(replies.iter().copied().collect()),
				prompts: prompts.clone(),
			};
			(scripted, prompts)
		}
	}

	#[async_trait]
	impl HumanSignal for Scripted {
		fn is_interactive(&self) -> bool {
			self.interactive
		}

		async fn wait_for_signal(&self, prompt: &str) -> Signal {
			self.prompts.lock().push(prompt.to_string());
			self.replies.lock().pop_front().unwrap_or(Signal::Closed)
		}
	}

	#[tokio::test(start_paused = true)]
	async fn bounded_wait_sleeps_then_clears() {
		let gate = ManualGate::unattended();
		let started = Instant::now();
		let outcome = gate
			.wait(&Checkpoint::bounded("let the page load", Duration::from_secs(5)), &Interrupt::new())
			.await;
		assert_eq!(outcome, GateOutcome::TimedOut);
		assert_near(started.elapsed(), Duration::from_secs(5));
	}

	#[tokio::test(start_paused = true)]
	async fn blocking_gate_without_human_falls_back_to_bounded_wait() {
		let gate = ManualGate::unattended().with_fallback(Duration::from_secs(60));
		let started = Instant::now();
		let outcome = gate.wait(&Checkpoint::blocking("solve the CAPTCHA"), &Interrupt::new()).await;
		assert_eq!(outcome, GateOutcome::TimedOut);
		assert_near(started.elapsed(), Duration::from_secs(60));
	}

	#[tokio::test(start_paused = true)]
	async fn blocking_gate_returns_on_acknowledgment() {
		let (signal, prompts) = Scripted::new(true, &[Signal::Continue]);
		let gate = ManualGate::new(Box::new(signal));
		let started = Instant::now();
		let outcome = gate.wait(&Checkpoint::blocking("verify your email"), &Interrupt::new()).await;
		assert_eq!(outcome, GateOutcome::Acknowledged);
		assert_eq!(started.elapsed(), Duration::ZERO);
		assert_eq!(prompts.lock().as_slice(), ["verify your email"]);
	}

	#[tokio::test(start_paused = true)]
	async fn closed_channel_degrades_to_fallback() {
		let (signal, _) = Scripted::new(true, &[Signal::Closed]);
		let gate = ManualGate::new(Box::new(signal)).with_fallback(Duration::from_secs(30));
		let started = Instant::now();
		assert_eq!(gate.wait(&Checkpoint::blocking("x"), &Interrupt::new()).await, GateOutcome::TimedOut);
		assert_near(started.elapsed(), Duration::from_secs(30));
	}

	#[tokio::test(start_paused = true)]
	async fn human_can_abort_a_blocking_gate() {
		let (signal, _) = Scripted::new(true, &[Signal::Abort]);
		let gate = ManualGate::new(Box::new(signal));
		let outcome = gate.wait(&Checkpoint::blocking("x"), &Interrupt::new()).await;
		assert_eq!(outcome, GateOutcome::Aborted);
		assert!(!outcome.is_cleared());
	}

	#[tokio::test(start_paused = true)]
	async fn interrupt_cuts_any_gate_short() {
		let gate = ManualGate::unattended().with_fallback(Duration::from_secs(60));
		let interrupt = Interrupt::new();
		let remote = interrupt.clone();
		tokio::spawn(async move {
			sleep(Duration::from_secs(2)).await;
			remote.trigger();
			sleep(Duration::from_secs(2)).await;
			remote.trigger();
		});

		let started = Instant::now();
		let bounded = gate
			.wait(&Checkpoint::bounded("wait for the list", Duration::from_secs(30)), &interrupt)
			.await;
		assert_eq!(bounded, GateOutcome::Aborted);
		assert_near(started.elapsed(), Duration::from_secs(2));

		let fallback = gate.wait(&Checkpoint::blocking("solve the CAPTCHA"), &interrupt).await;
		assert_eq!(fallback, GateOutcome::Aborted);
		assert_near(started.elapsed(), Duration::from_secs(4));
	}

	#[test]
	fn gate_spec_converts_to_mode() {
		assert_eq!(
			GateMode::from(GateSpec::BoundedWait { ms: 1500 }),
			GateMode::BoundedWait(Duration::from_millis(1500))
		);
		assert_eq!(GateMode::from(GateSpec::BlockOnHumanSignal), GateMode::BlockOnHumanSignal);
	}
}
