//! Machine-readable result envelope.
//!
//! With `--format json` every command prints exactly one envelope on stdout:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "ok": false,
//!   "command": "run",
//!   "data": { "flow": "signup", "result": { "status": "aborted", ... }, ... },
//!   "error": { "code": "RUN_ABORTED", "message": "aborted at \"fill missing-field\": resolution exhausted" },
//!   "timings": { "durationMs": 8012 }
//! }
//! ```
//!
//! Progress lines never share stdout with the envelope; in JSON mode they go to stderr.


use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Tagged progress lines and a summary for humans
	#[default]
	Text,
	/// One JSON envelope on stdout
	Json,
}

impl std::str::FromStr for OutputFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"text" => Ok(OutputFormat::Text),
			"json" => Ok(OutputFormat::Json),
			_ => Err(format!("unknown format: {s}")),
		}
	}
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult<T: Serialize> {
	pub schema_version: u32,

	pub ok: bool,

	pub command: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub timings: Option<Timings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
	pub code: ErrorCode,

	pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// The flow file is missing, unreadable or not valid JSON.
	InvalidFlow,
	/// A `${name}` placeholder has no binding.
	UnboundVariable,
	/// The flow parsed but does not build a valid sequence.
	InvalidSequence,
	ConfigError,
	/// The run ended with status `aborted`.
	RunAborted,
	/// The operator declined the pre-run confirmation.
	Cancelled,
	IoError,
	InternalError,
}

impl std::fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let code = match self {
			ErrorCode::InvalidFlow => "INVALID_FLOW",
			ErrorCode::UnboundVariable => "UNBOUND_VARIABLE",
			ErrorCode::InvalidSequence => "INVALID_SEQUENCE",
			ErrorCode::ConfigError => "CONFIG_ERROR",
			ErrorCode::RunAborted => "RUN_ABORTED",
			ErrorCode::Cancelled => "CANCELLED",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(code)
	}
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
	pub duration_ms: u64,
}

impl From<Duration> for Timings {
	fn from(duration: Duration) -> Self {
		Timings {
			duration_ms: duration.as_millis() as u64,
		}
	}
}

pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		CommandResult {
			schema_version: SCHEMA_VERSION,
			ok: self.error.is_none() && self.data.is_some(),
			command: self.command,
			data: self.data,
			error: self.error,
			timings: Some(Timings::from(self.start_time.elapsed())),
		}
	}
}

/// Prints the envelope in JSON mode; text mode has already printed everything.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	if format != OutputFormat::Json {
		return;
	}
	if let Ok(json) = serde_json::to_string_pretty(result) {
		let mut stdout = io::stdout().lock();
		let _ = writeln!(stdout, "{json}");
	}
}

pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}
