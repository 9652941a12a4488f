//! Exclusive ownership of one live agent connection.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::agent::{AgentHandle, Driver, DriverResult};

/// The single agent connection of a run.
///
/// A session can only be closed by consuming it, and only the recovery handler
/// does so, which keeps the close on one path.
pub struct Session {
	handle: Box<dyn AgentHandle>,
	driver: String,
	opened_at: Instant,
}

impl Session {
	pub async fn open(driver: &dyn Driver) -> DriverResult<Self> {
		debug!(target = "stepwise", driver = driver.name(), "opening session");
		let handle = driver.launch().await?;
		info!(target = "stepwise", driver = driver.name(), "session opened");

		Ok(Self {
			handle,
			driver: driver.name().to_string(),
			opened_at: Instant::now(),
		})
	}

	pub fn agent(&self) -> &dyn AgentHandle {
		self.handle.as_ref()
	}

	pub(crate) async fn close(self) -> DriverResult<()> {
		debug!(
			target = "stepwise",
			driver = %self.driver,
			alive_ms = self.opened_at.elapsed().as_millis() as u64,
			"closing session"
		);
		self.handle.close().await
	}
}
