//! `stepwise run`: drive a flow end to end under the recovery handler.

use std::path::Path;
use std::sync::Arc;

use stepwise::{EventSink, HumanSignal, Interrupt, ManualGate, SessionRecoveryHandler, compile};
use stepwise_runtime::driver_for;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{collect_vars, load_flow};
use crate::cli::RunArgs;
use crate::config::{self, RunSettings};
use crate::console::ConsoleSink;
use crate::error::{Result, StepwiseError};
use crate::output::{ErrorCode, OutputFormat, ResultBuilder, print_result};
use crate::signal::TerminalSignal;

pub async fn execute(args: RunArgs, config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
	let builder = ResultBuilder::new("run");

	let config = config::load(config_path)?;
	let settings = RunSettings::resolve(&args, &config);
	let flow = load_flow(&args.flow)?;
	let vars = collect_vars(&args.vars.vars);
	let sequence = compile(&flow, &vars).map_err(|source| StepwiseError::Flow {
		path: args.flow.clone(),
		source,
	})?;
	let driver = driver_for(&flow.agent, &settings.runtime);

	info!(
		target = "stepwise",
		flow = sequence.name(),
		driver = driver.name(),
		steps = sequence.len(),
		step_timeout_ms = settings.resolver.step_timeout.as_millis() as u64,
		"starting run"
	);

	let signal = TerminalSignal::new(args.non_interactive);
	if signal.is_interactive() && !args.yes {
		eprintln!(
			"About to run {} ({} steps) on {}.",
			sequence.name(),
			sequence.len(),
			driver.name()
		);
		if !signal.confirm("Continue?").await {
			return Err(StepwiseError::Cancelled);
		}
	}

	// In JSON mode stdout carries only the envelope.
	let sink: Arc<dyn EventSink> = match format {
		OutputFormat::Text => Arc::new(ConsoleSink::stdout()),
		OutputFormat::Json => Arc::new(ConsoleSink::stderr()),
	};

	let interrupt = Interrupt::new();
	let listener = listen_for_interrupt(interrupt.clone());

	let handler = SessionRecoveryHandler::new(driver)
		.gate(ManualGate::new(Box::new(signal)).with_fallback(settings.fallback_wait))
		.sink(sink)
		.resolver(settings.resolver)
		.interrupt(interrupt);
	let summary = handler.run_guarded(&sequence).await;
	listener.abort();

	let exit_code = summary.result.exit_code();
	let result = if exit_code != 0 {
		let message = summary.result.to_string();
		builder.data(summary).error(ErrorCode::RunAborted, message)
	} else {
		builder.data(summary)
	}
	.build();
	print_result(&result, format);

	match exit_code {
		0 => Ok(()),
		code => Err(StepwiseError::RunAborted { exit_code: code }),
	}
}

/// Every Ctrl-C becomes an interrupt request. The first stops the run at the next step
/// boundary; one arriving while a gate waits (including teardown) cuts that gate short.
/// The process never exits from here, so the session always gets closed.
fn listen_for_interrupt(interrupt: Interrupt) -> JoinHandle<()> {
	tokio::spawn(async move {
		while tokio::signal::ctrl_c().await.is_ok() {
			let first = !interrupt.is_triggered();
			warn!(target = "stepwise", first, "interrupt requested");
			interrupt.trigger();
			eprintln!("{}", interrupt_notice(first));
		}
	})
}

fn interrupt_notice(first: bool) -> &'static str {
	if first {
		"Stopping after the current step. Press Ctrl-C again to skip any wait and close the session."
	} else {
		"Closing the session."
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn notices_never_promise_an_immediate_exit() {
		assert!(interrupt_notice(true).starts_with("Stopping after the current step"));
		assert_eq!(interrupt_notice(false), "Closing the session.");
		assert!(!interrupt_notice(true).contains("exit"));
	}
}
