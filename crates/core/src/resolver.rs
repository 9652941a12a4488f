//! Executes one step: resolve the control, act on it, let the UI settle.

use std::time::Duration;

use stepwise_protocol::Locator;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::agent::{AgentHandle, DriverError};
use crate::chain::{LocatorAttempt, ResolutionFailed};
use crate::step::{Action, Step};

/// Resolver budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverConfig {
	/// Wall-clock budget for resolving one step's chain.
	pub step_timeout: Duration,
	/// Delay between lookups of the same locator.
	pub poll_interval: Duration,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			step_timeout: Duration::from_secs(20),
			poll_interval: Duration::from_millis(250),
		}
	}
}

#[derive(Debug)]
pub enum StepOutcome {
	Succeeded(StepSuccess),
	Failed(StepFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSuccess {
	pub locator: Locator,
	pub attempts: Vec<LocatorAttempt>,
}

/// Why a step did not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepFailure {
	/// Every locator in the chain failed; recoverable under `warn-and-continue`.
	#[error("resolution exhausted")]
	Resolution(ResolutionFailed),

	/// The control was found but the action on it failed.
	#[error("action failed on {locator}: {source}")]
	Action {
		locator: Locator,
		attempts: Vec<LocatorAttempt>,
		#[source]
		source: DriverError,
	},

	/// The agent session became unreachable.
	#[error("session lost: {message}")]
	Session {
		message: String,
		attempts: Vec<LocatorAttempt>,
	},
}

impl StepFailure {
	/// Only exhausted chains may be skipped; action and session failures are always fatal.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, StepFailure::Resolution(_))
	}

	pub fn attempts(&self) -> &[LocatorAttempt] {
		match self {
			StepFailure::Resolution(failed) => &failed.attempts,
			StepFailure::Action { attempts, .. } | StepFailure::Session { attempts, .. } => attempts,
		}
	}
}

/// Runs single steps against an agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepResolver {
	config: ResolverConfig,
}

impl StepResolver {
	pub fn new(config: ResolverConfig) -> Self {
		Self { config }
	}

	pub async fn execute(&self, step: &Step, agent: &dyn AgentHandle) -> StepOutcome {
		let budget = step.timeout().unwrap_or(self.config.step_timeout);
		let resolved = match step.chain().resolve(agent, budget, self.config.poll_interval).await {
			Ok(resolved) => resolved,
			Err(failed) => {
				let failure = match failed.session_lost() {
					Some(message) => StepFailure::Session {
						message: message.to_string(),
						attempts: failed.attempts.clone(),
					},
					None => StepFailure::Resolution(failed),
				};
				return StepOutcome::Failed(failure);
			}
		};

		debug!(
			target = "stepwise",
			step = step.label(),
			locator = %resolved.locator,
			action = %step.action().describe(),
			"performing action"
		);

		let acted = match step.action() {
			Action::Fill { value, .. } => resolved.control.fill(value).await,
			Action::Activate => resolved.control.activate().await,
		};

		if let Err(err) = acted {
			warn!(target = "stepwise", step = step.label(), locator = %resolved.locator, error = %err, "action failed");
			let failure = match err {
				DriverError::SessionLost(message) => StepFailure::Session {
					message,
					attempts: resolved.attempts,
				},
				source => StepFailure::Action {
					locator: resolved.locator,
					attempts: resolved.attempts,
					source,
				},
			};
			return StepOutcome::Failed(failure);
		}

		sleep(step.settle()).await;

		StepOutcome::Succeeded(StepSuccess {
			locator: resolved.locator,
			attempts: resolved.attempts,
		})
	}
}
