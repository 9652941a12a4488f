
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;
use crate::styles::help_styles;

/// Root CLI for stepwise.
#[derive(Parser, Debug)]
#[command(name = "stepwise")]
#[command(about = "Guided step-sequencer for browser and device flows")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format: text (default) or json
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Config file (default: <config dir>/stepwise/config.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Run a flow against its agent.
	Run(RunArgs),
	/// Validate a flow and print its plan without touching an agent.
	Check(CheckArgs),
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Run(_) => "run",
			Commands::Check(_) => "check",
		}
	}
}

#[derive(Args, Debug, Clone, Default)]
pub struct VarArgs {
	/// Bind a flow variable (repeatable), overriding flow and environment values
	#[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
	pub vars: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
	/// Flow file (JSON)
	#[arg(value_name = "FLOW")]
	pub flow: PathBuf,

	#[command(flatten)]
	pub vars: VarArgs,

	/// Skip the confirmation prompt before starting
	#[arg(short = 'y', long)]
	pub yes: bool,

	/// Never wait for a human; blocking checkpoints use the fallback wait
	#[arg(long)]
	pub non_interactive: bool,

	/// Per-step locator resolution budget in milliseconds
	#[arg(long, value_name = "MS")]
	pub step_timeout_ms: Option<u64>,

	/// Delay between lookups of the same locator in milliseconds
	#[arg(long, value_name = "MS")]
	pub poll_ms: Option<u64>,

	/// Bounded wait substituted for blocking checkpoints without a human
	#[arg(long, value_name = "SECS")]
	pub fallback_wait_secs: Option<u64>,

	/// WebDriver server URL for web flows
	#[arg(long, value_name = "URL")]
	pub webdriver_url: Option<String>,

	/// Run the browser headless
	#[arg(long)]
	pub headless: bool,

	/// adb device serial for device flows
	#[arg(long, value_name = "SERIAL")]
	pub serial: Option<String>,

	/// Path to the adb executable
	#[arg(long, value_name = "PATH")]
	pub adb: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
	/// Flow file (JSON)
	#[arg(value_name = "FLOW")]
	pub flow: PathBuf,

	#[command(flatten)]
	pub vars: VarArgs,
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
	let (key, value) = raw
		.split_once('=')
		.ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
	let key = key.trim();
	if key.is_empty() {
		return Err(format!("empty variable name in `{raw}`"));
	}
	Ok((key.to_string(), value.to_string()))
}
