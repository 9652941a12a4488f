mod check;
mod run;

use std::collections::BTreeMap;
use std::path::Path;

use stepwise::FlowFile;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::error::{Result, StepwiseError};
use crate::output::OutputFormat;

/// Prefix of environment variables that bind flow variables (`STEPWISE_VAR_EMAIL` binds `email`).
pub const VAR_ENV_PREFIX: &str = "STEPWISE_VAR_";

pub async fn dispatch(cli: Cli, format: OutputFormat) -> Result<()> {
	match cli.command {
		Commands::Run(args) => run::execute(args, cli.config.as_deref(), format).await,
		Commands::Check(args) => check::execute(&args, format),
	}
}

pub(crate) fn load_flow(path: &Path) -> Result<FlowFile> {
	debug!(target = "stepwise", path = %path.display(), "loading flow");
	let raw = std::fs::read_to_string(path).map_err(|source| StepwiseError::ReadFlow {
		path: path.to_path_buf(),
		source,
	})?;
	serde_json::from_str(&raw).map_err(|source| StepwiseError::ParseFlow {
		path: path.to_path_buf(),
		source,
	})
}

/// Variable overrides: environment first, then `--var` on top.
pub(crate) fn collect_vars(cli: &[(String, String)]) -> BTreeMap<String, String> {
	collect_vars_from(std::env::vars(), cli)
}

fn collect_vars_from(
	env: impl IntoIterator<Item = (String, String)>,
	cli: &[(String, String)],
) -> BTreeMap<String, String> {
	let mut vars: BTreeMap<String, String> = env
		.into_iter()
		.filter_map(|(key, value)| {
			let name = key.strip_prefix(VAR_ENV_PREFIX)?;
			(!name.is_empty()).then(|| (name.to_ascii_lowercase(), value))
		})
		.collect();
	vars.extend(cli.iter().cloned());
	vars
}

#[cfg(test)]
mod tests {
	use super::*;

	fn pair(key: &str, value: &str) -> (String, String) {
		(key.to_string(), value.to_string())
	}

	#[test]
	fn env_vars_are_prefixed_and_lowercased() {
		let env = [
			pair("STEPWISE_VAR_EMAIL", "env@example.com"),
			pair("STEPWISE_VAR_", "ignored"),
			pair("HOME", "/root"),
		];
		let vars = collect_vars_from(env, &[]);
		assert_eq!(vars.len(), 1);
		assert_eq!(vars["email"], "env@example.com");
	}

	#[test]
	fn command_line_wins_over_environment() {
		let env = [pair("STEPWISE_VAR_EMAIL", "env@example.com")];
		let vars = collect_vars_from(env, &[pair("email", "cli@example.com"), pair("username", "octo")]);
		assert_eq!(vars["email"], "cli@example.com");
		assert_eq!(vars["username"], "octo");
	}

	#[test]
	fn missing_and_malformed_flows_are_distinguished() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("absent.json");
		assert!(matches!(load_flow(&missing), Err(StepwiseError::ReadFlow { .. })));

		let broken = dir.path().join("broken.json");
		std::fs::write(&broken, "{ \"name\": ").unwrap();
		assert!(matches!(load_flow(&broken), Err(StepwiseError::ParseFlow { .. })));
	}
}
