//! Run outcome and the structured summary emitted at the end of every run.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one sequencer pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RunResult {
	/// Every step succeeded.
	Completed,
	/// The run reached the end, but the listed steps failed under `warn-and-continue`.
	CompletedWithWarnings { warnings: Vec<String> },
	/// A fatal failure stopped the run at `step`.
	#[serde(rename = "aborted")]
	AbortedAt { step: String, reason: String },
}

impl RunResult {
	pub fn aborted(step: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::AbortedAt {
			step: step.into(),
			reason: reason.into(),
		}
	}

	/// Returns true unless the run was aborted.
	pub fn is_success(&self) -> bool {
		!matches!(self, Self::AbortedAt { .. })
	}

	/// Process exit status for this outcome.
	pub fn exit_code(&self) -> i32 {
		if self.is_success() { 0 } else { 1 }
	}

	/// Short machine-friendly status word. Matches the serialized `status` tag.
	pub fn status(&self) -> &'static str {
		match self {
			Self::Completed => "completed",
			Self::CompletedWithWarnings { .. } => "completed-with-warnings",
			Self::AbortedAt { .. } => "aborted",
		}
	}
}

impl fmt::Display for RunResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Completed => write!(f, "completed"),
			Self::CompletedWithWarnings { warnings } => {
				write!(f, "completed with warnings at: {}", warnings.join(", "))
			}
			Self::AbortedAt { step, reason } => write!(f, "aborted at \"{step}\": {reason}"),
		}
	}
}

/// End-of-run report for operators and automation harnesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
	pub flow: String,
	pub result: RunResult,
	/// Steps that were attempted, in execution order.
	pub steps: Vec<StepReport>,
	pub executed: usize,
	pub warned: usize,
	pub total: usize,
	pub duration_ms: u64,
}

/// Record of one attempted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
	pub index: usize,
	pub label: String,
	pub status: StepStatus,
	/// Locator that resolved the control, when one did.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub locator: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub attempts: Vec<AttemptReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
	Succeeded,
	Warned,
	Aborted,
}

/// One locator tried while resolving a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReport {
	pub locator: String,
	pub outcome: String,
	pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn run_result_serializes_with_status_tag() {
		let aborted = RunResult::aborted("fill missing-field", "resolution exhausted");
		let json = serde_json::to_value(&aborted).unwrap();
		assert_eq!(json["status"], "aborted");
		assert_eq!(json["step"], "fill missing-field");
		assert_eq!(json["reason"], "resolution exhausted");

		let warned = RunResult::CompletedWithWarnings {
			warnings: vec!["fill missing-field".into()],
		};
		let json = serde_json::to_value(&warned).unwrap();
		assert_eq!(json["status"], "completed-with-warnings");
		assert_eq!(json["warnings"][0], "fill missing-field");
	}

	#[test]
	fn status_word_is_the_serialized_tag() {
		for result in [
			RunResult::Completed,
			RunResult::CompletedWithWarnings { warnings: vec!["x".into()] },
			RunResult::aborted("x", "y"),
		] {
			let json = serde_json::to_value(&result).unwrap();
			assert_eq!(json["status"], result.status());
			let back: RunResult = serde_json::from_value(json).unwrap();
			assert_eq!(back, result);
		}
	}

	#[test]
	fn exit_code_is_non_zero_only_for_aborts() {
		assert_eq!(RunResult::Completed.exit_code(), 0);
		assert_eq!(RunResult::CompletedWithWarnings { warnings: vec!["x".into()] }.exit_code(), 0);
		assert_eq!(RunResult::aborted("x", "y").exit_code(), 1);
	}

	#[test]
	fn display_names_the_aborting_step() {
		let result = RunResult::aborted("click continue-2", "resolution exhausted");
		assert_eq!(result.to_string(), "aborted at \"click continue-2\": resolution exhausted");
	}
}
