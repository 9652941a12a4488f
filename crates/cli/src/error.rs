use std::path::PathBuf;

use stepwise::FlowError;
use thiserror::Error;

use crate::output::{CommandError, ErrorCode};

pub type Result<T> = std::result::Result<T, StepwiseError>;

#[derive(Debug, Error)]
pub enum StepwiseError {
	/// The run ended in an abort that the summary already reported.
	/// Carries the run's exit code; nothing else is printed.
	#[error("")]
	RunAborted { exit_code: i32 },

	#[error("cannot read flow {path}")]
	ReadFlow {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid flow {path}: {source}")]
	ParseFlow {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("flow {path}: {source}")]
	Flow {
		path: PathBuf,
		#[source]
		source: FlowError,
	},

	#[error("config {path}: {message}")]
	Config { path: PathBuf, message: String },

	#[error("run cancelled by operator")]
	Cancelled,

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl StepwiseError {
	pub fn is_output_already_printed(&self) -> bool {
		matches!(self, StepwiseError::RunAborted { .. })
	}

	/// Process exit status for this error.
	pub fn exit_code(&self) -> i32 {
		match self {
			StepwiseError::RunAborted { exit_code } => *exit_code,
			_ => 1,
		}
	}

	pub fn code(&self) -> ErrorCode {
		match self {
			StepwiseError::RunAborted { .. } => ErrorCode::RunAborted,
			StepwiseError::ReadFlow { .. } | StepwiseError::ParseFlow { .. } => ErrorCode::InvalidFlow,
			StepwiseError::Flow {
				source: FlowError::UnboundVariable { .. },
				..
			} => ErrorCode::UnboundVariable,
			StepwiseError::Flow { .. } => ErrorCode::InvalidSequence,
			StepwiseError::Config { .. } => ErrorCode::ConfigError,
			StepwiseError::Cancelled => ErrorCode::Cancelled,
			StepwiseError::Io(_) => ErrorCode::IoError,
			StepwiseError::Json(_) | StepwiseError::Anyhow(_) => ErrorCode::InternalError,
		}
	}

	pub fn to_command_error(&self) -> CommandError {
		let message = match self {
			StepwiseError::ReadFlow { path, source } => format!("cannot read flow {}: {source}", path.display()),
			other => other.to_string(),
		};
		CommandError {
			code: self.code(),
			message,
		}
	}
}

#[cfg(test)]
mod tests {
	use stepwise::SequenceError;

	use super::*;

	#[test]
	fn flow_errors_map_to_codes() {
		let unbound = StepwiseError::Flow {
			path: "signup.json".into(),
			source: FlowError::UnboundVariable {
				name: "password".into(),
				location: "step 1".into(),
			},
		};
		assert_eq!(unbound.code(), ErrorCode::UnboundVariable);
		assert_eq!(
			unbound.to_command_error().message,
			"flow signup.json: unbound variable ${password} in step 1"
		);

		let empty = StepwiseError::Flow {
			path: "empty.json".into(),
			source: FlowError::Sequence(SequenceError::NoSteps),
		};
		assert_eq!(empty.code(), ErrorCode::InvalidSequence);
	}

	#[test]
	fn read_errors_include_the_cause() {
		let err = StepwiseError::ReadFlow {
			path: "missing.json".into(),
			source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
		};
		assert_eq!(err.code(), ErrorCode::InvalidFlow);
		assert_eq!(
			err.to_command_error().message,
			"cannot read flow missing.json: No such file or directory"
		);
	}

	#[test]
	fn aborts_are_silent() {
		assert!(StepwiseError::RunAborted { exit_code: 1 }.is_output_already_printed());
		assert!(!StepwiseError::Cancelled.is_output_already_printed());
	}

	#[test]
	fn aborted_runs_exit_with_the_run_result_code() {
		let result = stepwise::RunResult::AbortedAt {
			step: "fill email".into(),
			reason: "resolution exhausted".into(),
		};
		let err = StepwiseError::RunAborted {
			exit_code: result.exit_code(),
		};
		assert_eq!(err.exit_code(), result.exit_code());
		assert_eq!(err.exit_code(), 1);
		assert_eq!(StepwiseError::Cancelled.exit_code(), 1);
	}
}
