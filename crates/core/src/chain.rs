//! Ordered locator fallback chains.
//!
//! A [`LocatorChain`] owns the candidate locators for one step. Resolution walks
//! them in declared order under a single wall-clock budget: attempt `k` of `n`
//! gets `remaining / (n - k)` of whatever budget is left, polls the agent until
//! the control shows up or its share runs out, then hands the rest on. The first
//! locator that yields a control wins; later entries are never consulted.

use std::fmt;
use std::time::Duration;

use stepwise_protocol::{AttemptReport, Locator};
use thiserror::Error;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, trace};

use crate::agent::{AgentHandle, Control, DriverError};

/// Why a chain cannot be built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
	#[error("locator chain is empty")]
	Empty,

	#[error("positional locator {0} must be the last entry of its chain")]
	PositionNotLast(String),

	#[error("positional locator {0} cannot be the only entry of its chain")]
	PositionOnly(String),

	/// A blank text or attribute value would match every control on screen.
	#[error("locator {0} has an empty value")]
	BlankValue(String),
}

/// Ordered candidate locators for one control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorChain {
	locators: Vec<Locator>,
}

impl LocatorChain {
	pub fn new(locators: Vec<Locator>) -> Result<Self, ChainError> {
		if locators.is_empty() {
			return Err(ChainError::Empty);
		}
		let last = locators.len() - 1;
		if last == 0 && locators[0].is_positional() {
			return Err(ChainError::PositionOnly(locators[0].to_string()));
		}
		if let Some(pos) = locators.iter().take(last).find(|l| l.is_positional()) {
			return Err(ChainError::PositionNotLast(pos.to_string()));
		}
		if let Some(blank) = locators.iter().find(|l| is_blank(l)) {
			return Err(ChainError::BlankValue(blank.to_string()));
		}
		Ok(Self { locators })
	}

	pub fn locators(&self) -> &[Locator] {
		&self.locators
	}

	pub fn primary(&self) -> &Locator {
		&self.locators[0]
	}

	pub fn len(&self) -> usize {
		self.locators.len()
	}

	pub fn is_empty(&self) -> bool {
		self.locators.is_empty()
	}

	/// Resolves the first actionable control within `budget`.
	pub async fn resolve(
		&self,
		agent: &dyn AgentHandle,
		budget: Duration,
		poll_interval: Duration,
	) -> Result<ResolvedControl, ResolutionFailed> {
		let deadline = Instant::now() + budget;
		let total = self.locators.len();
		let mut attempts = Vec::with_capacity(total);

		for (index, locator) in self.locators.iter().enumerate() {
			let started = Instant::now();
			let remaining = deadline.saturating_duration_since(started);
			if remaining.is_zero() {
				attempts.push(LocatorAttempt::new(locator, AttemptOutcome::BudgetExhausted, Duration::ZERO));
				continue;
			}

			let share = remaining / (total - index) as u32;
			trace!(target = "stepwise", %locator, share_ms = share.as_millis() as u64, "trying locator");

			match poll_locator(agent, locator, started + share, poll_interval).await {
				Poll::Found(control) => {
					debug!(target = "stepwise", %locator, index, "locator matched");
					attempts.push(LocatorAttempt::new(locator, AttemptOutcome::Matched, started.elapsed()));
					return Ok(ResolvedControl {
						control,
						locator: locator.clone(),
						index,
						attempts,
					});
				}
				Poll::Missing => {
					attempts.push(LocatorAttempt::new(locator, AttemptOutcome::NotFound, started.elapsed()));
				}
				Poll::Failed(DriverError::SessionLost(msg)) => {
					attempts.push(LocatorAttempt::new(locator, AttemptOutcome::SessionLost(msg), started.elapsed()));
					return Err(ResolutionFailed { attempts });
				}
				Poll::Failed(err) => {
					debug!(target = "stepwise", %locator, error = %err, "locator lookup failed");
					attempts.push(LocatorAttempt::new(locator, AttemptOutcome::Error(err.to_string()), started.elapsed()));
				}
			}
		}

		Err(ResolutionFailed { attempts })
	}
}

fn is_blank(locator: &Locator) -> bool {
	match locator {
		Locator::Attribute { name, value, .. } => name.trim().is_empty() || value.trim().is_empty(),
		Locator::Role { selector } => selector.trim().is_empty(),
		Locator::Text { text, .. } => text.trim().is_empty(),
		Locator::Position { .. } => false,
	}
}

enum Poll {
	Found(Box<dyn Control>),
	Missing,
	Failed(DriverError),
}

/// Polls one locator until it matches or `until` passes. Always looks at least once.
async fn poll_locator(agent: &dyn AgentHandle, locator: &Locator, until: Instant, poll_interval: Duration) -> Poll {
	loop {
		let left = until.saturating_duration_since(Instant::now());
		match timeout(left, agent.find_control(locator)).await {
			Ok(Ok(Some(control))) => return Poll::Found(control),
			Ok(Ok(None)) => {}
			Ok(Err(err)) => return Poll::Failed(err),
			Err(_) => return Poll::Missing,
		}

		let left = until.saturating_duration_since(Instant::now());
		if left.is_zero() {
			return Poll::Missing;
		}
		sleep(poll_interval.min(left)).await;
	}
}

/// A control found by a chain, with the locator that found it.
pub struct ResolvedControl {
	pub control: Box<dyn Control>,
	pub locator: Locator,
	/// Position of `locator` in the chain.
	pub index: usize,
	pub attempts: Vec<LocatorAttempt>,
}

impl fmt::Debug for ResolvedControl {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedControl")
			.field("locator", &self.locator)
			.field("index", &self.index)
			.field("attempts", &self.attempts)
			.finish_non_exhaustive()
	}
}

/// Every locator in the chain failed within the budget.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("resolution exhausted after {} locator attempt(s)", attempts.len())]
pub struct ResolutionFailed {
	pub attempts: Vec<LocatorAttempt>,
}

impl ResolutionFailed {
	/// Message of the session-loss that cut resolution short, if any.
	pub fn session_lost(&self) -> Option<&str> {
		self.attempts.iter().find_map(|a| match &a.outcome {
			AttemptOutcome::SessionLost(msg) => Some(msg.as_str()),
			_ => None,
		})
	}
}

/// Diagnostic record of one locator attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorAttempt {
	pub locator: Locator,
	pub outcome: AttemptOutcome,
	pub elapsed: Duration,
}

impl LocatorAttempt {
	fn new(locator: &Locator, outcome: AttemptOutcome, elapsed: Duration) -> Self {
		Self {
			locator: locator.clone(),
			outcome,
			elapsed,
		}
	}

	pub fn to_report(&self) -> AttemptReport {
		AttemptReport {
			locator: self.locator.to_string(),
			outcome: self.outcome.to_string(),
			elapsed_ms: self.elapsed.as_millis() as u64,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
	Matched,
	NotFound,
	/// Earlier attempts used up the budget before this locator was tried.
	BudgetExhausted,
	Error(String),
	SessionLost(String),
}

impl fmt::Display for AttemptOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Matched => write!(f, "matched"),
			Self::NotFound => write!(f, "not found"),
			Self::BudgetExhausted => write!(f, "budget exhausted"),
			Self::Error(msg) => write!(f, "error: {msg}"),
			Self::SessionLost(msg) => write!(f, "session lost: {msg}"),
		}
	}
}
