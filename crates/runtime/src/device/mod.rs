//! Android device agents driven through `adb`.
//!
//! Controls are found in a `uiautomator dump` of the current screen and actuated
//! with `input tap` / `input text` at the node's center. Positional locators tap
//! raw screen coordinates.

mod adb;
pub mod hierarchy;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use stepwise::{AgentHandle, Control, Driver, DriverError, DriverResult};
use stepwise_protocol::Locator;
use tracing::{debug, info};

pub use adb::{Adb, escape_input_text, focus_contains, locate_adb};
use hierarchy::UiNode;

const LAUNCHER_CATEGORY: &str = "android.intent.category.LAUNCHER";

pub struct DeviceDriver {
	adb: Option<PathBuf>,
	serial: Option<String>,
	name: String,
}

impl DeviceDriver {
	pub fn new(adb: Option<PathBuf>, serial: Option<String>) -> Self {
		let name = format!("adb {}", serial.as_deref().unwrap_or("(default device)"));
		Self { adb, serial, name }
	}
}

#[async_trait]
impl Driver for DeviceDriver {
	fn name(&self) -> &str {
		&self.name
	}

	async fn launch(&self) -> DriverResult<Box<dyn AgentHandle>> {
		let program = locate_adb(self.adb.as_deref())?;
		let adb = Adb::new(program, self.serial.clone());

		let state = adb
			.run(&["get-state"])
			.await
			.map_err(|e| DriverError::Launch(e.to_string()))?;
		let state = state.trim();
		if state != "device" {
			return Err(DriverError::Launch(format!("device is {state}, not ready")));
		}

		info!(target = "stepwise", serial = adb.serial().unwrap_or("default"), "device attached");
		Ok(Box::new(DeviceAgent {
			adb: Arc::new(adb),
			package: Mutex::new(None),
		}))
	}
}

struct DeviceAgent {
	adb: Arc<Adb>,
	/// Package started by `navigate`; checked for focus and force-stopped on close.
	package: Mutex<Option<String>>,
}

impl DeviceAgent {
	async fn dump(&self) -> DriverResult<Vec<UiNode>> {
		let xml = self.adb.run(&["exec-out", "uiautomator", "dump", "/dev/tty"]).await?;
		Ok(hierarchy::parse(&xml))
	}

	fn tap_control(&self, x: i32, y: i32, existing: usize) -> Box<dyn Control> {
		Box::new(TapControl {
			adb: self.adb.clone(),
			x,
			y,
			existing,
		})
	}

	fn package(&self) -> Option<String> {
		self.package.lock().clone()
	}
}

#[async_trait]
impl AgentHandle for DeviceAgent {
	async fn find_control(&self, locator: &Locator) -> DriverResult<Option<Box<dyn Control>>> {
		if let Locator::Position { x, y } = locator {
			return Ok(Some(self.tap_control(*x, *y, 0)));
		}

		let nodes = self.dump().await?;
		Ok(nodes
			.iter()
			.find(|node| node.is_actionable() && node.matches(locator))
			.map(|node| {
				let (x, y) = node.center();
				debug!(target = "stepwise", %locator, x, y, class = %node.class, "node matched");
				self.tap_control(x, y, node.text.chars().count())
			}))
	}

	/// `package/.Activity` starts that activity; a bare package fires its launcher intent.
	async fn navigate(&self, target: &str) -> DriverResult<()> {
		let (package, output) = match target.split_once('/') {
			Some((package, _)) => (package, self.adb.shell(&["am", "start", "-n", target]).await?),
			None => (
				target,
				self.adb
					.shell(&["monkey", "-p", target, "-c", LAUNCHER_CATEGORY, "1"])
					.await?,
			),
		};

		if let Some(line) = output.lines().find(|line| line.trim_start().starts_with("Error")) {
			return Err(DriverError::Command(line.trim().to_string()));
		}
		*self.package.lock() = Some(package.to_string());
		Ok(())
	}

	async fn check_health(&self) -> DriverResult<()> {
		let Some(package) = self.package() else {
			return self.adb.run(&["get-state"]).await.map(|_| ());
		};
		let windows = self.adb.shell(&["dumpsys", "window"]).await?;
		if focus_contains(&windows, &package) {
			Ok(())
		} else {
			Err(DriverError::SessionLost(format!("{package} no longer holds window focus")))
		}
	}

	async fn close(&self) -> DriverResult<()> {
		match self.package() {
			Some(package) => self.adb.shell(&["am", "force-stop", &package]).await.map(|_| ()),
			None => Ok(()),
		}
	}
}

/// Taps at fixed screen coordinates.
struct TapControl {
	adb: Arc<Adb>,
	x: i32,
	y: i32,
	/// Characters already in the field, deleted before typing.
	existing: usize,
}

impl TapControl {
	async fn tap(&self) -> DriverResult<()> {
		let (x, y) = (self.x.to_string(), self.y.to_string());
		self.adb.shell(&["input", "tap", &x, &y]).await.map(|_| ())
	}
}

#[async_trait]
impl Control for TapControl {
	async fn fill(&self, text: &str) -> DriverResult<()> {
		self.tap().await?;
		if self.existing > 0 {
			let mut keys = vec!["input", "keyevent", "KEYCODE_MOVE_END"];
			keys.extend(std::iter::repeat_n("KEYCODE_DEL", self.existing));
			self.adb.shell(&keys).await?;
		}
		if !text.is_empty() {
			let escaped = escape_input_text(text);
			self.adb.shell(&["input", "text", &escaped]).await?;
		}
		Ok(())
	}

	async fn activate(&self) -> DriverResult<()> {
		self.tap().await
	}
}
