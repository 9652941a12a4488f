//! Steps: one logical interaction with a locator chain, an action and a policy.

use std::time::Duration;

use stepwise_protocol::{FailurePolicy, Locator};

use crate::chain::LocatorChain;
use crate::sequence::{SequenceDefaults, SequenceError};

/// What to do with a resolved control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	Fill { value: String, secret: bool },
	Activate,
}

impl Action {
	/// Verb used in default step labels.
	pub fn verb(&self) -> &'static str {
		match self {
			Action::Fill { .. } => "fill",
			Action::Activate => "click",
		}
	}

	/// Log-safe description; secret values are masked.
	pub fn describe(&self) -> String {
		match self {
			Action::Fill { value, secret: true } => format!("fill {}", "*".repeat(value.chars().count())),
			Action::Fill { value, secret: false } => format!("fill \"{value}\""),
			Action::Activate => "activate".to_string(),
		}
	}
}

/// An immutable step inside a built [`Sequence`](crate::Sequence).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
	label: String,
	chain: LocatorChain,
	action: Action,
	policy: FailurePolicy,
	settle: Duration,
	timeout: Option<Duration>,
}

impl Step {
	pub fn fill(value: impl Into<String>) -> StepBuilder {
		StepBuilder::new(Action::Fill {
			value: value.into(),
			secret: false,
		})
	}

	/// Like [`Step::fill`], but the value never appears in output.
	pub fn fill_secret(value: impl Into<String>) -> StepBuilder {
		StepBuilder::new(Action::Fill {
			value: value.into(),
			secret: true,
		})
	}

	pub fn activate() -> StepBuilder {
		StepBuilder::new(Action::Activate)
	}

	pub fn label(&self) -> &str {
		&self.label
	}

	pub fn chain(&self) -> &LocatorChain {
		&self.chain
	}

	pub fn action(&self) -> &Action {
		&self.action
	}

	pub fn policy(&self) -> FailurePolicy {
		self.policy
	}

	/// Pause applied after the action succeeds.
	pub fn settle(&self) -> Duration {
		self.settle
	}

	/// Per-step override of the resolver budget.
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout
	}
}

/// Collects a step's parts until the owning sequence is built.
#[derive(Debug, Clone)]
pub struct StepBuilder {
	label: Option<String>,
	action: Action,
	locators: Vec<Locator>,
	policy: Option<FailurePolicy>,
	settle: Option<Duration>,
	timeout: Option<Duration>,
}

impl StepBuilder {
	pub fn new(action: Action) -> Self {
		Self {
			label: None,
			action,
			locators: Vec::new(),
			policy: None,
			settle: None,
			timeout: None,
		}
	}

	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	/// Appends a locator at the lowest priority so far.
	pub fn locate(mut self, locator: Locator) -> Self {
		self.locators.push(locator);
		self
	}

	pub fn locate_all(mut self, locators: impl IntoIterator<Item = Locator>) -> Self {
		self.locators.extend(locators);
		self
	}

	pub fn policy(mut self, policy: FailurePolicy) -> Self {
		self.policy = Some(policy);
		self
	}

	pub fn warn_and_continue(self) -> Self {
		self.policy(FailurePolicy::WarnAndContinue)
	}

	pub fn settle(mut self, settle: Duration) -> Self {
		self.settle = Some(settle);
		self
	}

	pub fn timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub(crate) fn build(self, index: usize, defaults: &SequenceDefaults) -> Result<Step, SequenceError> {
		let label = match self.label {
			Some(label) if label.trim().is_empty() => return Err(SequenceError::EmptyLabel { index }),
			Some(label) => label,
			None => match self.locators.first() {
				Some(primary) => format!("{} {}", self.action.verb(), primary.key()),
				None => format!("{} #{index}", self.action.verb()),
			},
		};

		let chain = LocatorChain::new(self.locators).map_err(|source| SequenceError::Chain {
			index,
			label: label.clone(),
			source,
		})?;

		let settle = self.settle.unwrap_or(match self.action {
			Action::Fill { .. } => defaults.fill_settle,
			Action::Activate => defaults.activate_settle,
		});

		Ok(Step {
			label,
			chain,
			action: self.action,
			policy: self.policy.unwrap_or(defaults.policy),
			settle,
			timeout: self.timeout,
		})
	}
}
