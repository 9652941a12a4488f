//! Scripted agents, signal channels and sinks for driving the engine in tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stepwise::{AgentHandle, Control, Driver, DriverError, DriverResult, EventSink, HumanSignal, Locator, RunEvent, Signal};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub enum Presence {
	Always,
	/// Becomes actionable this long after launch.
	After(Duration),
}

#[derive(Default)]
struct Script {
	presence: Mutex<HashMap<Locator, Presence>>,
	failing_actions: Mutex<HashSet<Locator>>,
	panicking: Mutex<HashSet<Locator>>,
	session_killers: Mutex<HashSet<Locator>>,
	launch_fails: AtomicBool,
	navigation_fails: AtomicBool,
	close_fails: AtomicBool,
	unhealthy: AtomicBool,
	calls: Mutex<Vec<String>>,
	launches: AtomicUsize,
	closes: AtomicUsize,
}

impl Script {
	fn log(&self, call: String) {
		self.calls.lock().push(call);
	}
}

/// Driver whose agents follow a shared script; clones observe the same calls.
#[derive(Clone, Default)]
pub struct FakeDriver {
	script: Arc<Script>,
}

impl FakeDriver {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn present(self, locator: Locator) -> Self {
		self.script.presence.lock().insert(locator, Presence::Always);
		self
	}

	pub fn appears_after(self, locator: Locator, after: Duration) -> Self {
		self.script.presence.lock().insert(locator, Presence::After(after));
		self
	}

	pub fn action_fails(self, locator: Locator) -> Self {
		self.script.presence.lock().insert(locator.clone(), Presence::Always);
		self.script.failing_actions.lock().insert(locator);
		self
	}

	pub fn panics_on(self, locator: Locator) -> Self {
		self.script.panicking.lock().insert(locator);
		self
	}

	pub fn loses_session_on(self, locator: Locator) -> Self {
		self.script.session_killers.lock().insert(locator);
		self
	}

	pub fn launch_fails(self) -> Self {
		self.script.launch_fails.store(true, Ordering::SeqCst);
		self
	}

	pub fn navigation_fails(self) -> Self {
		self.script.navigation_fails.store(true, Ordering::SeqCst);
		self
	}

	pub fn close_fails(self) -> Self {
		self.script.close_fails.store(true, Ordering::SeqCst);
		self
	}

	pub fn unhealthy(self) -> Self {
		self.script.unhealthy.store(true, Ordering::SeqCst);
		self
	}

	pub fn calls(&self) -> Vec<String> {
		self.script.calls.lock().clone()
	}

	/// Calls other than lookups and health checks.
	pub fn actions(&self) -> Vec<String> {
		self.calls()
			.into_iter()
			.filter(|c| !c.starts_with("find ") && c != "check health")
			.collect()
	}

	pub fn finds(&self, locator: &Locator) -> usize {
		let needle = format!("find {locator}");
		self.calls().iter().filter(|c| **c == needle).count()
	}

	pub fn launches(&self) -> usize {
		self.script.launches.load(Ordering::SeqCst)
	}

	pub fn closes(&self) -> usize {
		self.script.closes.load(Ordering::SeqCst)
	}

	pub async fn agent(&self) -> Box<dyn AgentHandle> {
		self.launch().await.unwrap()
	}
}

#[async_trait]
impl Driver for FakeDriver {
	fn name(&self) -> &str {
		"fake"
	}

	async fn launch(&self) -> DriverResult<Box<dyn AgentHandle>> {
		self.script.launches.fetch_add(1, Ordering::SeqCst);
		if self.script.launch_fails.load(Ordering::SeqCst) {
			return Err(DriverError::Launch("no agent attached".into()));
		}
		Ok(Box::new(FakeAgent {
			script: self.script.clone(),
			launched: Instant::now(),
		}))
	}
}

struct FakeAgent {
	script: Arc<Script>,
	launched: Instant,
}

#[async_trait]
impl AgentHandle for FakeAgent {
	async fn find_control(&self, locator: &Locator) -> DriverResult<Option<Box<dyn Control>>> {
		self.script.log(format!("find {locator}"));
		if self.script.panicking.lock().contains(locator) {
			panic!("agent exploded on {locator}");
		}
		if self.script.session_killers.lock().contains(locator) {
			return Err(DriverError::SessionLost("browser window closed".into()));
		}

		let present = match self.script.presence.lock().get(locator) {
			Some(Presence::Always) => true,
			Some(Presence::After(after)) => self.launched.elapsed() >= *after,
			None => false,
		};
		Ok(present.then(|| {
			Box::new(FakeControl {
				script: self.script.clone(),
				locator: locator.clone(),
			}) as Box<dyn Control>
		}))
	}

	async fn navigate(&self, target: &str) -> DriverResult<()> {
		self.script.log(format!("navigate {target}"));
		if self.script.navigation_fails.load(Ordering::SeqCst) {
			return Err(DriverError::Command("net::ERR_NAME_NOT_RESOLVED".into()));
		}
		Ok(())
	}

	async fn check_health(&self) -> DriverResult<()> {
		self.script.log("check health".into());
		if self.script.unhealthy.load(Ordering::SeqCst) {
			return Err(DriverError::SessionLost("app is no longer in the foreground".into()));
		}
		Ok(())
	}

	async fn close(&self) -> DriverResult<()> {
		self.script.log("close".into());
		self.script.closes.fetch_add(1, Ordering::SeqCst);
		if self.script.close_fails.load(Ordering::SeqCst) {
			return Err(DriverError::Command("already closed".into()));
		}
		Ok(())
	}
}

struct FakeControl {
	script: Arc<Script>,
	locator: Locator,
}

impl FakeControl {
	fn act(&self, call: String) -> DriverResult<()> {
		self.script.log(call);
		if self.script.failing_actions.lock().contains(&self.locator) {
			return Err(DriverError::Command("element not interactable".into()));
		}
		Ok(())
	}
}

#[async_trait]
impl Control for FakeControl {
	async fn fill(&self, text: &str) -> DriverResult<()> {
		self.act(format!("fill {}={text}", self.locator))
	}

	async fn activate(&self) -> DriverResult<()> {
		self.act(format!("activate {}", self.locator))
	}
}

/// Interactive signal channel replaying canned replies, then EOF.
pub struct ScriptedSignal {
	replies: Mutex<VecDeque<Signal>>,
	prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSignal {
	pub fn new(replies: &[Signal]) -> (Self, Arc<Mutex<Vec<String>>>) {
		let prompts = Arc::new(Mutex::new(Vec::new()));
		let signal = Self {
			replies: Mutex::new(replies.iter().copied().collect()),
			prompts: prompts.clone(),
		};
		(signal, prompts)
	}
}

#[async_trait]
impl HumanSignal for ScriptedSignal {
	fn is_interactive(&self) -> bool {
		true
	}

	async fn wait_for_signal(&self, prompt: &str) -> Signal {
		self.prompts.lock().push(prompt.to_string());
		self.replies.lock().pop_front().unwrap_or(Signal::Closed)
	}
}

#[derive(Default)]
pub struct RecordingSink {
	events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
	pub fn events(&self) -> Vec<RunEvent> {
		self.events.lock().clone()
	}
}

impl EventSink for RecordingSink {
	fn emit(&self, event: &RunEvent) {
		self.events.lock().push(event.clone());
	}
}

/// Virtual-time comparison; the timer wheel rounds deadlines up to the millisecond.
pub fn assert_near(actual: Duration, expected: Duration) {
	assert!(
		actual >= expected && actual < expected + Duration::from_millis(10),
		"expected ~{expected:?}, got {actual:?}"
	);
}
