//! Locating and invoking the `adb` executable.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use stepwise::{DriverError, DriverResult};
use tokio::process::Command;
use tracing::{debug, trace, warn};

/// Lines adb itself prints when the device is gone. Output of the command run on
/// the device (`sh: uiautomator: not found`) must not match.
static DEVICE_LOST: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(?mi)^(?:error|adb): (?:device '[^']*' not found|device offline|device unauthorized|device still authorizing|no devices/emulators found|closed)\b",
	)
	.unwrap()
});

/// Finds the adb executable.
///
/// Checked in order:
/// 1. an explicit path (command line or config file)
/// 2. the `STEPWISE_ADB` environment variable
/// 3. `$ANDROID_HOME/platform-tools` and `$ANDROID_SDK_ROOT/platform-tools`
/// 4. `adb` on `PATH`
pub fn locate_adb(explicit: Option<&Path>) -> DriverResult<PathBuf> {
	if let Some(path) = explicit {
		if path.exists() {
			return Ok(path.to_path_buf());
		}
		warn!(target = "stepwise", path = %path.display(), "configured adb path does not exist; searching");
	}

	if let Some(path) = std::env::var_os("STEPWISE_ADB").map(PathBuf::from) {
		if path.exists() {
			return Ok(path);
		}
	}

	for sdk in ["ANDROID_HOME", "ANDROID_SDK_ROOT"] {
		if let Some(root) = std::env::var_os(sdk) {
			let candidate = PathBuf::from(root)
				.join("platform-tools")
				.join(if cfg!(windows) { "adb.exe" } else { "adb" });
			if candidate.exists() {
				debug!(target = "stepwise", source = sdk, path = %candidate.display(), "found adb");
				return Ok(candidate);
			}
		}
	}

	which::which("adb").map_err(|_| {
		DriverError::Launch("adb executable not found. Install Android platform-tools or set STEPWISE_ADB.".into())
	})
}

/// One adb binary bound to one device.
#[derive(Debug, Clone)]
pub struct Adb {
	program: PathBuf,
	serial: Option<String>,
}

impl Adb {
	pub fn new(program: PathBuf, serial: Option<String>) -> Self {
		Self { program, serial }
	}

	pub fn serial(&self) -> Option<&str> {
		self.serial.as_deref()
	}

	/// Runs `adb [-s serial] <args>` and returns stdout.
	pub async fn run(&self, args: &[&str]) -> DriverResult<String> {
		let mut command = Command::new(&self.program);
		if let Some(serial) = &self.serial {
			command.arg("-s").arg(serial);
		}
		command.args(args).kill_on_drop(true);
		trace!(target = "stepwise", ?args, "adb");

		let output = command
			.output()
			.await
			.map_err(|e| DriverError::Command(format!("cannot run {}: {e}", self.program.display())))?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(classify(stderr.trim()));
		}
		Ok(String::from_utf8_lossy(&output.stdout).into_owned())
	}

	pub async fn shell(&self, args: &[&str]) -> DriverResult<String> {
		let mut full = Vec::with_capacity(args.len() + 1);
		full.push("shell");
		full.extend_from_slice(args);
		self.run(&full).await
	}
}

pub fn classify(stderr: &str) -> DriverError {
	if DEVICE_LOST.is_match(stderr) {
		DriverError::SessionLost(stderr.to_string())
	} else {
		DriverError::Command(format!("adb: {stderr}"))
	}
}

/// Escapes `text` for `adb shell input text`: spaces become `%s`, shell
/// metacharacters are backslash-escaped.
pub fn escape_input_text(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for ch in text.chars() {
		match ch {
			' ' => escaped.push_str("%s"),
			'\\' | '\'' | '"' | '`' | '$' | '&' | '|' | ';' | '<' | '>' | '(' | ')' | '*' | '~' | '#' | '?' | '!' | '[' | ']'
			| '{' | '}' => {
				escaped.push('\\');
				escaped.push(ch);
			}
			_ => escaped.push(ch),
		}
	}
	escaped
}

/// Whether a `dumpsys window` listing shows `package` holding focus.
pub fn focus_contains(dumpsys: &str, package: &str) -> bool {
	dumpsys
		.lines()
		.filter(|line| line.contains("mCurrentFocus") || line.contains("mFocusedApp"))
		.any(|line| line.contains(package))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn input_text_is_escaped_for_the_device_shell() {
		assert_eq!(escape_input_text("Item Teste"), "Item%sTeste");
		assert_eq!(escape_input_text("a&b;c"), r"a\&b\;c");
		assert_eq!(escape_input_text("it's $5"), "it\\'s%s\\$5");
		assert_eq!(escape_input_text("Regressão"), "Regressão");
	}

	#[test]
	fn focus_is_read_from_focus_lines_only() {
		let dumpsys = "  mLastFocus=com.example.minhascompras\n  mCurrentFocus=Window{1f u0 com.android.launcher3/.Launcher}\n  mFocusedApp=ActivityRecord{2a u0 com.android.launcher3/.Launcher t1}";
		assert!(!focus_contains(dumpsys, "com.example.minhascompras"));
		assert!(focus_contains(dumpsys, "com.android.launcher3"));
	}

	#[test]
	fn offline_devices_are_session_loss() {
		assert!(classify("error: device offline").is_session_lost());
		assert!(classify("error: device 'emulator-5554' not found").is_session_lost());
		assert_eq!(
			classify("Error: Activity class does not exist."),
			DriverError::Command("adb: Error: Activity class does not exist.".into())
		);
	}

	#[test]
	fn only_adb_transport_errors_are_session_loss() {
		assert!(classify("error: closed").is_session_lost());
		assert!(classify("adb: device 'emulator-5554' not found").is_session_lost());
		assert!(classify("* daemon started *\nerror: no devices/emulators found").is_session_lost());

		for stderr in [
			"/system/bin/sh: uiautomator: not found",
			"cat: /sdcard/window_dump.xml: No such file or directory",
			"java.io.IOException: Stream closed",
			"Error: package com.example.missing not found",
		] {
			assert!(!classify(stderr).is_session_lost(), "{stderr}");
		}
	}

	#[test]
	fn explicit_adb_path_wins() {
		let dir = tempfile::tempdir().unwrap();
		let adb = dir.path().join("adb");
		std::fs::write(&adb, "").unwrap();
		assert_eq!(locate_adb(Some(&adb)).unwrap(), adb);
	}
}
