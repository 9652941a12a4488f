//! Agent adapters for the stepwise engine.
//!
//! - [`webdriver`] drives a browser through an already running WebDriver server
//! - [`device`] drives an Android device or emulator through `adb`
//!
//! Both implement [`stepwise::Driver`]; [`driver_for`] picks one from a flow's
//! [`AgentSpec`].

pub mod device;
pub mod webdriver;

use std::path::PathBuf;

use stepwise::Driver;
use stepwise_protocol::AgentSpec;

pub use device::DeviceDriver;
pub use webdriver::WebDriver;

/// Settings that override what a flow file asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
	pub webdriver_url: Option<String>,
	pub headless: Option<bool>,
	pub adb: Option<PathBuf>,
	pub serial: Option<String>,
}

/// Builds the driver for `agent`, letting `options` win over the flow's own values.
pub fn driver_for(agent: &AgentSpec, options: &RuntimeOptions) -> Box<dyn Driver> {
	match agent {
		AgentSpec::Web {
			browser,
			webdriver_url,
			headless,
			args,
		} => {
			let url = options
				.webdriver_url
				.clone()
				.or_else(|| webdriver_url.clone())
				.unwrap_or_else(|| webdriver::DEFAULT_WEBDRIVER_URL.to_string());
			Box::new(
				WebDriver::new(*browser, url)
					.headless(options.headless.unwrap_or(*headless))
					.args(args.clone()),
			)
		}
		AgentSpec::Device { serial } => Box::new(DeviceDriver::new(
			options.adb.clone(),
			options.serial.clone().or_else(|| serial.clone()),
		)),
	}
}
