//! Optional JSON config file and the precedence rules around it.
//!
//! Precedence for every run setting: command line, then config file, then the flow
//! file, then built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stepwise::{DEFAULT_FALLBACK_WAIT, ResolverConfig};
use stepwise_runtime::RuntimeOptions;
use tracing::debug;

use crate::cli::RunArgs;
use crate::error::{Result, StepwiseError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigFile {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub step_timeout_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub poll_interval_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fallback_wait_secs: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub webdriver_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub headless: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub adb_path: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub serial: Option<String>,
}

pub fn default_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("stepwise").join("config.json"))
}

/// Loads `explicit`, which must exist, or the default path if present.
pub fn load(explicit: Option<&Path>) -> Result<ConfigFile> {
	let path = match explicit {
		Some(path) => path.to_path_buf(),
		None => match default_path() {
			Some(path) if path.exists() => path,
			_ => return Ok(ConfigFile::default()),
		},
	};

	debug!(target = "stepwise", path = %path.display(), "loading config");
	let raw = std::fs::read_to_string(&path).map_err(|e| StepwiseError::Config {
		path: path.clone(),
		message: e.to_string(),
	})?;
	serde_json::from_str(&raw).map_err(|e| StepwiseError::Config {
		path,
		message: e.to_string(),
	})
}

/// Effective settings for one `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
	pub resolver: ResolverConfig,
	pub fallback_wait: Duration,
	pub runtime: RuntimeOptions,
}

impl RunSettings {
	pub fn resolve(args: &RunArgs, config: &ConfigFile) -> Self {
		let defaults = ResolverConfig::default();
		let resolver = ResolverConfig {
			step_timeout: args
				.step_timeout_ms
				.or(config.step_timeout_ms)
				.map_or(defaults.step_timeout, Duration::from_millis),
			poll_interval: args
				.poll_ms
				.or(config.poll_interval_ms)
				.map_or(defaults.poll_interval, Duration::from_millis),
		};

		let fallback_wait = args
			.fallback_wait_secs
			.or(config.fallback_wait_secs)
			.map_or(DEFAULT_FALLBACK_WAIT, Duration::from_secs);

		let runtime = RuntimeOptions {
			webdriver_url: args.webdriver_url.clone().or_else(|| config.webdriver_url.clone()),
			headless: if args.headless { Some(true) } else { config.headless },
			adb: args.adb.clone().or_else(|| config.adb_path.clone()),
			serial: args.serial.clone().or_else(|| config.serial.clone()),
		};

		Self {
			resolver,
			fallback_wait,
			runtime,
		}
	}
}
