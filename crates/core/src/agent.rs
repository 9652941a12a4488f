//! Driver collaborator interface.
//!
//! The engine never provisions drivers or injects input itself. It consumes an agent
//! through three traits: a [`Driver`] launches an [`AgentHandle`], the handle finds
//! [`Control`]s by [`Locator`], and controls accept `fill`/`activate`.

use async_trait::async_trait;
use stepwise_protocol::Locator;
use thiserror::Error;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Errors surfaced by driver implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
	/// The agent could not be started or connected to.
	#[error("agent launch failed: {0}")]
	Launch(String),

	/// The agent session is gone (browser closed, device offline, app crashed).
	#[error("agent session lost: {0}")]
	SessionLost(String),

	/// The agent cannot interpret this locator.
	#[error("unsupported locator {0}")]
	Unsupported(String),

	/// Any other command failure reported by the agent.
	#[error("{0}")]
	Command(String),
}

impl DriverError {
	pub fn is_session_lost(&self) -> bool {
		matches!(self, DriverError::SessionLost(_))
	}
}

/// A resolved, actionable on-screen control.
#[async_trait]
pub trait Control: Send + Sync {
	/// Replaces the control's content with `text`.
	async fn fill(&self, text: &str) -> DriverResult<()>;

	/// Clicks or taps the control.
	async fn activate(&self) -> DriverResult<()>;
}

/// One live connection to an agent.
#[async_trait]
pub trait AgentHandle: Send + Sync {
	/// Single lookup for an actionable control. `Ok(None)` means not (yet) present.
	async fn find_control(&self, locator: &Locator) -> DriverResult<Option<Box<dyn Control>>>;

	async fn navigate(&self, target: &str) -> DriverResult<()>;

	/// Liveness check; `Err(SessionLost)` when the agent is no longer usable.
	async fn check_health(&self) -> DriverResult<()> {
		Ok(())
	}

	async fn close(&self) -> DriverResult<()>;
}

/// Launches agents.
#[async_trait]
pub trait Driver: Send + Sync {
	/// Name used in logs and console output.
	fn name(&self) -> &str;

	async fn launch(&self) -> DriverResult<Box<dyn AgentHandle>>;
}
