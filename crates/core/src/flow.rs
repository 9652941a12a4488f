//! Compiles a [`FlowFile`] into a validated [`Sequence`].
//!
//! `${name}` placeholders are expanded in fill values, locator strings, the entry
//! target and checkpoint instructions. Flow `vars` are the lowest-priority source;
//! callers pass higher-priority bindings (environment, command line) as overrides.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use stepwise_protocol::{ActionSpec, FlowFile, StepSpec};
use thiserror::Error;

use crate::gate::Checkpoint;
use crate::sequence::{Sequence, SequenceDefaults, SequenceError};
use crate::step::{Step, StepBuilder};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.-]*)\}").unwrap());

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
	#[error("unbound variable ${{{name}}} in {location}")]
	UnboundVariable { name: String, location: String },

	#[error(transparent)]
	Sequence(#[from] SequenceError),
}

/// Variable bindings after precedence has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars(BTreeMap<String, String>);

impl Vars {
	/// Layers `overrides` on top of the flow's own defaults.
	pub fn layered(flow: &FlowFile, overrides: &BTreeMap<String, String>) -> Self {
		let mut vars = flow.vars.clone();
		vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
		Self(vars)
	}

	/// Expands every placeholder in `input`; `location` names the field for errors.
	pub fn expand<'s>(&self, input: &'s str, location: &str) -> Result<Cow<'s, str>, FlowError> {
		if let Some(missing) = PLACEHOLDER
			.captures_iter(input)
			.map(|caps| caps[1].to_string())
			.find(|name| !self.0.contains_key(name))
		{
			return Err(FlowError::UnboundVariable {
				name: missing,
				location: location.to_string(),
			});
		}

		Ok(PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| self.0[&caps[1]].clone()))
	}
}

/// Builds the runnable sequence for `flow` with `overrides` bound over its vars.
pub fn compile(flow: &FlowFile, overrides: &BTreeMap<String, String>) -> Result<Sequence, FlowError> {
	let vars = Vars::layered(flow, overrides);
	let mut builder = Sequence::builder(flow.name.clone())
		.defaults(SequenceDefaults::from(&flow.defaults))
		.warmup(Duration::from_millis(flow.warmup_ms))
		.health_checks(flow.health_checks);

	if let Some(entry) = &flow.entry {
		builder = builder.entry(vars.expand(entry, "entry")?);
	}

	for (index, spec) in flow.steps.iter().enumerate() {
		builder = builder.step(compile_step(index, spec, &vars)?);
	}

	for (index, spec) in flow.checkpoints.iter().enumerate() {
		let instruction = vars.expand(&spec.instruction, &format!("checkpoint {index}"))?;
		let position = spec.before.unwrap_or(flow.steps.len());
		builder = builder.checkpoint_at(position, Checkpoint::new(instruction, spec.gate.into()));
	}

	Ok(builder.build()?)
}

fn compile_step(index: usize, spec: &StepSpec, vars: &Vars) -> Result<StepBuilder, FlowError> {
	let location = format!("step {index}");

	let mut step = match &spec.action {
		ActionSpec::Fill { value, secret: false } => Step::fill(vars.expand(value, &location)?),
		ActionSpec::Fill { value, secret: true } => Step::fill_secret(vars.expand(value, &location)?),
		ActionSpec::Activate => Step::activate(),
	};

	let locators = spec
		.locate
		.iter()
		.map(|locator| locator.map_strings(|s| vars.expand(s, &location).map(Cow::into_owned)))
		.collect::<Result<Vec<_>, _>>()?;
	step = step.locate_all(locators);

	if let Some(label) = &spec.label {
		step = step.label(label.clone());
	}
	if let Some(policy) = spec.policy {
		step = step.policy(policy);
	}
	if let Some(ms) = spec.settle_ms {
		step = step.settle(Duration::from_millis(ms));
	}
	if let Some(ms) = spec.timeout_ms {
		step = step.timeout(Duration::from_millis(ms));
	}

	Ok(step)
}
