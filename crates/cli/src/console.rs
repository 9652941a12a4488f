//! Operator console: tagged progress lines plus the final summary line.

use std::fmt;
use std::io::{self, IsTerminal, Write};

use colored::Colorize;
use parking_lot::Mutex;
use stepwise::{EventSink, GateOutcome, RunEvent, RunResult, RunSummary, StepStatus};

/// Severity tag printed at the start of every console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
	Info,
	Ok,
	Aviso,
	Erro,
}

impl Tag {
	pub fn as_str(self) -> &'static str {
		match self {
			Tag::Info => "INFO",
			Tag::Ok => "OK",
			Tag::Aviso => "AVISO",
			Tag::Erro => "ERRO",
		}
	}

	fn colored(self) -> String {
		let tag = format!("[{}]", self.as_str());
		match self {
			Tag::Info => tag.cyan().to_string(),
			Tag::Ok => tag.green().bold().to_string(),
			Tag::Aviso => tag.yellow().bold().to_string(),
			Tag::Erro => tag.red().bold().to_string(),
		}
	}
}

impl fmt::Display for Tag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}]", self.as_str())
	}
}

/// One console line before coloring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
	pub tag: Option<Tag>,
	pub text: String,
}

impl Line {
	fn tagged(tag: Tag, text: impl Into<String>) -> Self {
		Self {
			tag: Some(tag),
			text: text.into(),
		}
	}

	fn bare(text: impl Into<String>) -> Self {
		Self { tag: None, text: text.into() }
	}
}

impl fmt::Display for Line {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.tag {
			Some(tag) => write!(f, "{tag} {}", self.text),
			None => f.write_str(&self.text),
		}
	}
}

/// Turns an event into console lines. Pure, so the wording is testable.
pub fn render(event: &RunEvent) -> Vec<Line> {
	match event {
		RunEvent::SessionOpening { driver } => vec![Line::tagged(Tag::Info, format!("Opening session ({driver})"))],
		RunEvent::SessionOpened { driver } => vec![Line::tagged(Tag::Ok, format!("Session ready ({driver})"))],
		RunEvent::SessionFailed { error } => vec![Line::tagged(Tag::Erro, format!("Could not open session: {error}"))],
		RunEvent::Navigating { target } => vec![Line::tagged(Tag::Info, format!("Opening {target}"))],
		RunEvent::WarmingUp { wait } => vec![Line::tagged(
			Tag::Info,
			format!("Waiting {} ms for the agent to settle", wait.as_millis()),
		)],
		RunEvent::CheckpointReached {
			instruction, blocking, ..
		} => {
			let mut lines = vec![Line::tagged(Tag::Aviso, format!("Checkpoint: {instruction}"))];
			if *blocking {
				lines.push(Line::tagged(
					Tag::Info,
					"Press ENTER to continue, or type 'abort' to stop the run",
				));
			}
			lines
		}
		RunEvent::CheckpointCleared { outcome, .. } => match outcome {
			GateOutcome::Acknowledged => vec![Line::tagged(Tag::Ok, "Checkpoint acknowledged")],
			GateOutcome::TimedOut => vec![Line::tagged(Tag::Info, "Checkpoint wait elapsed, continuing")],
			GateOutcome::Aborted => vec![Line::tagged(Tag::Erro, "Run aborted at checkpoint")],
		},
		RunEvent::StepStarted {
			index,
			total,
			label,
			action,
		} => vec![Line::tagged(
			Tag::Info,
			format!("Step {}/{total}: {label} ({action})", index + 1),
		)],
		RunEvent::StepSucceeded { label, locator, .. } => {
			vec![Line::tagged(Tag::Ok, format!("{label} via {locator}"))]
		}
		RunEvent::StepWarned {
			label,
			reason,
			attempts,
			..
		} => {
			let mut lines = vec![Line::tagged(Tag::Aviso, format!("{label} skipped: {reason}"))];
			lines.extend(attempts.iter().map(|a| Line::bare(format!("    tried {a}"))));
			lines
		}
		RunEvent::StepAborted {
			label,
			reason,
			attempts,
			..
		} => {
			let mut lines = vec![Line::tagged(Tag::Erro, format!("{label} failed: {reason}"))];
			lines.extend(attempts.iter().map(|a| Line::bare(format!("    tried {a}"))));
			lines
		}
		RunEvent::Interrupted { .. } => vec![Line::tagged(Tag::Aviso, "Interrupted by operator")],
		RunEvent::RunFinished { summary } => render_summary(summary),
		RunEvent::AwaitingTeardown { blocking, fallback } => {
			if *blocking {
				vec![Line::tagged(
					Tag::Info,
					"The session stays open for inspection. Press ENTER to close it",
				)]
			} else {
				vec![Line::tagged(
					Tag::Info,
					format!("Closing the session in {} s", fallback.as_secs()),
				)]
			}
		}
		RunEvent::SessionClosed => vec![Line::tagged(Tag::Info, "Session closed")],
		RunEvent::SessionCloseFailed { error } => {
			vec![Line::tagged(Tag::Aviso, format!("Session did not close cleanly: {error}"))]
		}
	}
}

fn render_summary(summary: &RunSummary) -> Vec<Line> {
	let mut lines = Vec::new();
	match &summary.result {
		RunResult::Completed => lines.push(Line::tagged(
			Tag::Ok,
			format!("{} completed: {} of {} steps", summary.flow, summary.executed, summary.total),
		)),
		RunResult::CompletedWithWarnings { warnings } => {
			lines.push(Line::tagged(
				Tag::Aviso,
				format!("{} completed with {} warning(s)", summary.flow, warnings.len()),
			));
			lines.extend(warnings.iter().map(|label| Line::bare(format!("    skipped {label}"))));
		}
		RunResult::AbortedAt { step, reason } => {
			lines.push(Line::tagged(
				Tag::Erro,
				format!("{} aborted at \"{step}\": {reason}", summary.flow),
			));
			if let Some(report) = summary.steps.iter().find(|s| s.status == StepStatus::Aborted) {
				lines.extend(report.attempts.iter().map(|a| {
					Line::bare(format!("    tried {} -> {} ({} ms)", a.locator, a.outcome, a.elapsed_ms))
				}));
			}
		}
	}
	lines.push(Line::bare(summary_line(summary)));
	lines
}

/// Single machine-greppable line closing every run.
pub fn summary_line(summary: &RunSummary) -> String {
	let mut line = format!(
		"SUMMARY status={} executed={} warned={} total={} duration_ms={}",
		summary.result.status(),
		summary.executed,
		summary.warned,
		summary.total,
		summary.duration_ms
	);
	if let RunResult::AbortedAt { step, reason } = &summary.result {
		line.push_str(&format!(" step={step:?} reason={reason:?}"));
	}
	line
}

/// [`EventSink`] writing rendered lines to a terminal stream.
pub struct ConsoleSink {
	out: Mutex<Box<dyn Write + Send>>,
	color: bool,
}

impl ConsoleSink {
	pub fn new(out: Box<dyn Write + Send>, color: bool) -> Self {
		Self {
			out: Mutex::new(out),
			color,
		}
	}

	/// Colors tags only when stdout is a terminal.
	pub fn stdout() -> Self {
		Self::new(Box::new(io::stdout()), io::stdout().is_terminal())
	}

	pub fn stderr() -> Self {
		Self::new(Box::new(io::stderr()), io::stderr().is_terminal())
	}
}

impl EventSink for ConsoleSink {
	fn emit(&self, event: &RunEvent) {
		let mut out = self.out.lock();
		for line in render(event) {
			// a closed stdout must not take the run down with it
			let _ = match line.tag {
				Some(tag) if self.color => writeln!(out, "{} {}", tag.colored(), line.text),
				_ => writeln!(out, "{line}"),
			};
		}
		let _ = out.flush();
	}
}
