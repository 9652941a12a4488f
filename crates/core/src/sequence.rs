//! Immutable step sequences and their builder.

use std::time::Duration;

use stepwise_protocol::{FailurePolicy, StepDefaults};
use thiserror::Error;

use crate::chain::ChainError;
use crate::gate::Checkpoint;
use crate::step::{Step, StepBuilder};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SequenceError {
	#[error("sequence has no steps")]
	NoSteps,

	#[error("step {index} has an empty label")]
	EmptyLabel { index: usize },

	#[error("step {index} ({label}): {source}")]
	Chain {
		index: usize,
		label: String,
		#[source]
		source: ChainError,
	},

	#[error("checkpoint at position {position} is past the end of a {len}-step sequence")]
	CheckpointOutOfRange { position: usize, len: usize },
}

/// Values applied to steps that do not set their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceDefaults {
	pub fill_settle: Duration,
	pub activate_settle: Duration,
	pub policy: FailurePolicy,
}

impl Default for SequenceDefaults {
	fn default() -> Self {
		Self::from(&StepDefaults::default())
	}
}

impl From<&StepDefaults> for SequenceDefaults {
	fn from(defaults: &StepDefaults) -> Self {
		Self {
			fill_settle: Duration::from_millis(defaults.fill_settle_ms),
			activate_settle: Duration::from_millis(defaults.activate_settle_ms),
			policy: defaults.policy,
		}
	}
}

/// A fixed, ordered list of steps plus the checkpoints attached between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
	name: String,
	steps: Vec<Step>,
	/// `(position, checkpoint)`, processed before the step at `position`;
	/// `position == steps.len()` runs after the last step.
	checkpoints: Vec<(usize, Checkpoint)>,
	entry: Option<String>,
	warmup: Duration,
	health_checks: bool,
}

impl Sequence {
	pub fn builder(name: impl Into<String>) -> SequenceBuilder {
		SequenceBuilder::new(name)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn steps(&self) -> &[Step] {
		&self.steps
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// Checkpoints to clear before the step at `position`, in declaration order.
	pub fn checkpoints_at(&self, position: usize) -> impl Iterator<Item = &Checkpoint> {
		self.checkpoints.iter().filter(move |(at, _)| *at == position).map(|(_, cp)| cp)
	}

	pub fn checkpoints(&self) -> &[(usize, Checkpoint)] {
		&self.checkpoints
	}

	pub fn entry(&self) -> Option<&str> {
		self.entry.as_deref()
	}

	pub fn warmup(&self) -> Duration {
		self.warmup
	}

	pub fn health_checks(&self) -> bool {
		self.health_checks
	}

	/// Label of the step at `position`, or a marker for the end of the sequence.
	pub fn label_at(&self, position: usize) -> &str {
		self.steps.get(position).map(Step::label).unwrap_or("end of sequence")
	}
}

/// Builder for [`Sequence`]. Validation happens once, in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SequenceBuilder {
	name: String,
	defaults: SequenceDefaults,
	steps: Vec<StepBuilder>,
	checkpoints: Vec<(usize, Checkpoint)>,
	entry: Option<String>,
	warmup: Duration,
	health_checks: bool,
}

impl SequenceBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			defaults: SequenceDefaults::default(),
			steps: Vec::new(),
			checkpoints: Vec::new(),
			entry: None,
			warmup: Duration::ZERO,
			health_checks: false,
		}
	}

	pub fn defaults(mut self, defaults: SequenceDefaults) -> Self {
		self.defaults = defaults;
		self
	}

	pub fn step(mut self, step: StepBuilder) -> Self {
		self.steps.push(step);
		self
	}

	/// Attaches a checkpoint before the next step added (or at the end).
	pub fn checkpoint(mut self, checkpoint: Checkpoint) -> Self {
		self.checkpoints.push((self.steps.len(), checkpoint));
		self
	}

	pub fn checkpoint_at(mut self, position: usize, checkpoint: Checkpoint) -> Self {
		self.checkpoints.push((position, checkpoint));
		self
	}

	pub fn entry(mut self, target: impl Into<String>) -> Self {
		self.entry = Some(target.into());
		self
	}

	pub fn warmup(mut self, warmup: Duration) -> Self {
		self.warmup = warmup;
		self
	}

	pub fn health_checks(mut self, enabled: bool) -> Self {
		self.health_checks = enabled;
		self
	}

	pub fn build(self) -> Result<Sequence, SequenceError> {
		if self.steps.is_empty() {
			return Err(SequenceError::NoSteps);
		}

		let len = self.steps.len();
		if let Some((position, _)) = self.checkpoints.iter().find(|(at, _)| *at > len) {
			return Err(SequenceError::CheckpointOutOfRange { position: *position, len });
		}

		let steps = self
			.steps
			.into_iter()
			.enumerate()
			.map(|(index, step)| step.build(index, &self.defaults))
			.collect::<Result<Vec<_>, _>>()?;

		let mut checkpoints = self.checkpoints;
		checkpoints.sort_by_key(|(at, _)| *at);

		Ok(Sequence {
			name: self.name,
			steps,
			checkpoints,
			entry: self.entry,
			warmup: self.warmup,
			health_checks: self.health_checks,
		})
	}
}
