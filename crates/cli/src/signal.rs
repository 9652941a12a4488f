//! Human-signal channel backed by the controlling terminal.

use std::io::{IsTerminal, Write};

use async_trait::async_trait;
use stepwise::{HumanSignal, Signal};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Reads operator replies from stdin. Ctrl-C is not handled here: it reaches gates as
/// an [`Interrupt`](stepwise::Interrupt) request.
pub struct TerminalSignal {
	interactive: bool,
	lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalSignal {
	/// Interactive only when stdin is a terminal and the caller did not opt out.
	pub fn new(force_non_interactive: bool) -> Self {
		Self {
			interactive: !force_non_interactive && std::io::stdin().is_terminal(),
			lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
		}
	}

	async fn next_reply(&self) -> Option<String> {
		let mut lines = self.lines.lock().await;
		match lines.next_line().await {
			Ok(line) => line,
			Err(err) => {
				warn!(target = "stepwise", error = %err, "stdin read failed");
				None
			}
		}
	}

	/// Asks `question` with a y/n suffix. EOF proceeds.
	pub async fn confirm(&self, question: &str) -> bool {
		eprint!("{question} (y/n) ");
		let _ = std::io::stderr().flush();
		match self.next_reply().await {
			Some(reply) => parse_confirm(&reply),
			None => {
				eprintln!();
				true
			}
		}
	}
}

#[async_trait]
impl HumanSignal for TerminalSignal {
	fn is_interactive(&self) -> bool {
		self.interactive
	}

	async fn wait_for_signal(&self, prompt: &str) -> Signal {
		debug!(target = "stepwise", prompt, "waiting for operator");
		match self.next_reply().await {
			Some(reply) => parse_reply(&reply),
			None => Signal::Closed,
		}
	}
}

/// Any line continues except an explicit abort word.
pub fn parse_reply(reply: &str) -> Signal {
	match reply.trim().to_ascii_lowercase().as_str() {
		"abort" | "a" | "q" | "quit" => Signal::Abort,
		_ => Signal::Continue,
	}
}

/// Empty input accepts; so do `y`, `yes`, `s` and `sim`.
pub fn parse_confirm(reply: &str) -> bool {
	matches!(
		reply.trim().to_ascii_lowercase().as_str(),
		"" | "y" | "yes" | "s" | "sim"
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn abort_words_abort() {
		for word in ["abort", "A", " q ", "QUIT"] {
			assert_eq!(parse_reply(word), Signal::Abort, "{word}");
		}
	}

	#[test]
	fn anything_else_continues() {
		for word in ["", "ok", "done", "continue", "abortar"] {
			assert_eq!(parse_reply(word), Signal::Continue, "{word}");
		}
	}

	#[test]
	fn confirmation_answers() {
		assert!(parse_confirm("y"));
		assert!(parse_confirm("Yes\n"));
		assert!(parse_confirm("s"));
		assert!(parse_confirm(""));
		assert!(!parse_confirm("n"));
		assert!(!parse_confirm("no"));
		assert!(!parse_confirm("later"));
	}
}
