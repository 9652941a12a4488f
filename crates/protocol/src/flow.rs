//! Flow file schema.
//!
//! A flow file is a JSON document describing which agent to drive, where to start,
//! the ordered steps with their locator chains, and the checkpoints that hand
//! control to a human:
//!
//! ```json
//! {
//!   "name": "signup",
//!   "agent": { "kind": "web", "browser": "chrome" },
//!   "entry": "https://example.com/signup",
//!   "vars": { "email": "someone@example.com" },
//!   "steps": [
//!     { "do": "fill", "value": "${email}", "locate": [{ "by": "attribute", "name": "id", "value": "email" }] },
//!     { "do": "activate", "policy": "warn-and-continue", "locate": [{ "by": "role", "selector": "button[type='submit']" }] }
//!   ],
//!   "checkpoints": [{ "instruction": "Solve the CAPTCHA", "gate": { "mode": "block-on-human-signal" } }]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::locator::Locator;

/// Root document of a flow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowFile {
	pub name: String,

	pub agent: AgentSpec,

	/// Navigation target opened once the session is established.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub entry: Option<String>,

	/// Pause after entry navigation, before the first step.
	#[serde(default)]
	pub warmup_ms: u64,

	/// Check agent liveness after every step.
	#[serde(default)]
	pub health_checks: bool,

	/// Default values for `${name}` placeholders.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub vars: BTreeMap<String, String>,

	#[serde(default)]
	pub defaults: StepDefaults,

	pub steps: Vec<StepSpec>,

	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub checkpoints: Vec<CheckpointSpec>,
}

/// Which kind of agent a flow drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AgentSpec {
	/// Browser driven over the WebDriver protocol.
	#[serde(rename_all = "camelCase")]
	Web {
		#[serde(default)]
		browser: BrowserKind,
		/// WebDriver server URL (for example `http://localhost:9515`).
		#[serde(default, skip_serializing_if = "Option::is_none")]
		webdriver_url: Option<String>,
		#[serde(default)]
		headless: bool,
		/// Extra browser command-line arguments.
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		args: Vec<String>,
	},
	/// Android device or emulator driven through adb.
	#[serde(rename_all = "camelCase")]
	Device {
		/// adb serial (for example `emulator-5554`); the only attached device when omitted.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		serial: Option<String>,
	},
}

/// Browser engine requested from the WebDriver server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
	#[default]
	Chrome,
	Firefox,
}

/// What happens when a step's locator chain is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
	/// Abort the run at this step.
	#[default]
	Fatal,
	/// Record a warning and move on to the next step.
	WarnAndContinue,
}

/// Flow-wide defaults applied to steps that do not override them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefaults {
	#[serde(default = "default_fill_settle_ms")]
	pub fill_settle_ms: u64,
	#[serde(default = "default_activate_settle_ms")]
	pub activate_settle_ms: u64,
	#[serde(default)]
	pub policy: FailurePolicy,
}

fn default_fill_settle_ms() -> u64 {
	1_000
}

fn default_activate_settle_ms() -> u64 {
	3_000
}

impl Default for StepDefaults {
	fn default() -> Self {
		Self {
			fill_settle_ms: default_fill_settle_ms(),
			activate_settle_ms: default_activate_settle_ms(),
			policy: FailurePolicy::default(),
		}
	}
}

/// One step as written in a flow file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSpec {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub label: Option<String>,

	#[serde(flatten)]
	pub action: ActionSpec,

	/// Locator chain, highest priority first.
	pub locate: Vec<Locator>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub policy: Option<FailurePolicy>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub settle_ms: Option<u64>,

	/// Overrides the resolver's per-step timeout.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout_ms: Option<u64>,
}

/// Action performed on the resolved control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "do", rename_all = "camelCase")]
pub enum ActionSpec {
	Fill {
		value: String,
		/// Mask the value in console and log output.
		#[serde(default)]
		secret: bool,
	},
	Activate,
}

/// A hand-off point where a human must act before the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSpec {
	/// Index of the step the checkpoint precedes; the end of the sequence when omitted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub before: Option<usize>,
	pub instruction: String,
	pub gate: GateSpec,
}

/// How a checkpoint waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum GateSpec {
	BoundedWait { ms: u64 },
	BlockOnHumanSignal,
}
