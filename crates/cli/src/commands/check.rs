//! `stepwise check`: compile a flow and show what a run would do.

use serde::Serialize;
use stepwise::{FailurePolicy, GateMode, Sequence, compile};
use stepwise_runtime::{RuntimeOptions, driver_for};

use super::{collect_vars, load_flow};
use crate::cli::CheckArgs;
use crate::error::{Result, StepwiseError};
use crate::output::{OutputFormat, ResultBuilder, print_result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
	pub flow: String,
	pub driver: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub entry: Option<String>,
	pub warmup_ms: u64,
	pub health_checks: bool,
	pub steps: Vec<PlannedStep>,
	pub checkpoints: Vec<PlannedCheckpoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStep {
	pub index: usize,
	pub label: String,
	/// Secret fill values are masked.
	pub action: String,
	pub policy: FailurePolicy,
	pub settle_ms: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timeout_ms: Option<u64>,
	pub chain: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCheckpoint {
	/// Step index the checkpoint precedes; equal to the step count when it runs last.
	pub before: usize,
	pub instruction: String,
	pub gate: String,
}

impl Plan {
	pub fn new(sequence: &Sequence, driver: impl Into<String>) -> Self {
		let steps = sequence
			.steps()
			.iter()
			.enumerate()
			.map(|(index, step)| PlannedStep {
				index,
				label: step.label().to_string(),
				action: step.action().describe(),
				policy: step.policy(),
				settle_ms: step.settle().as_millis() as u64,
				timeout_ms: step.timeout().map(|t| t.as_millis() as u64),
				chain: step.chain().locators().iter().map(ToString::to_string).collect(),
			})
			.collect();

		let checkpoints = sequence
			.checkpoints()
			.iter()
			.map(|(before, checkpoint)| PlannedCheckpoint {
				before: *before,
				instruction: checkpoint.instruction.clone(),
				gate: match checkpoint.mode {
					GateMode::BoundedWait(wait) => format!("bounded wait {} ms", wait.as_millis()),
					GateMode::BlockOnHumanSignal => "block on human signal".to_string(),
				},
			})
			.collect();

		Self {
			flow: sequence.name().to_string(),
			driver: driver.into(),
			entry: sequence.entry().map(str::to_string),
			warmup_ms: sequence.warmup().as_millis() as u64,
			health_checks: sequence.health_checks(),
			steps,
			checkpoints,
		}
	}

	pub fn render(&self) -> Vec<String> {
		let mut lines = vec![format!("{} ({} steps, {})", self.flow, self.steps.len(), self.driver)];
		if let Some(entry) = &self.entry {
			lines.push(format!("  entry: {entry}"));
		}
		if self.warmup_ms > 0 {
			lines.push(format!("  warmup: {} ms", self.warmup_ms));
		}
		if self.health_checks {
			lines.push("  health checks after every step".to_string());
		}

		for position in 0..=self.steps.len() {
			for checkpoint in self.checkpoints.iter().filter(|c| c.before == position) {
				lines.push(format!("  checkpoint: {} [{}]", checkpoint.instruction, checkpoint.gate));
			}
			let Some(step) = self.steps.get(position) else {
				continue;
			};
			let policy = match step.policy {
				FailurePolicy::Fatal => "fatal",
				FailurePolicy::WarnAndContinue => "warn-and-continue",
			};
			lines.push(format!(
				"  {}. {} ({}, {policy}, settle {} ms)",
				step.index + 1,
				step.label,
				step.action,
				step.settle_ms
			));
			lines.extend(step.chain.iter().map(|locator| format!("       - {locator}")));
		}
		lines
	}
}

pub fn execute(args: &CheckArgs, format: OutputFormat) -> Result<()> {
	let builder = ResultBuilder::new("check");
	let flow = load_flow(&args.flow)?;
	let vars = collect_vars(&args.vars.vars);
	let sequence = compile(&flow, &vars).map_err(|source| StepwiseError::Flow {
		path: args.flow.clone(),
		source,
	})?;

	let driver = driver_for(&flow.agent, &RuntimeOptions::default());
	let plan = Plan::new(&sequence, driver.name());

	if format == OutputFormat::Text {
		for line in plan.render() {
			println!("{line}");
		}
	}
	print_result(&builder.data(plan).build(), format);
	Ok(())
}
