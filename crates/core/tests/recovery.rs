mod support;

use std::sync::Arc;
use std::time::Duration;

use stepwise::{
	Checkpoint, Interrupt, Locator, ManualGate, RunEvent, RunResult, Sequence, SessionRecoveryHandler, Signal, Step,
	StepStatus,
};
use support::{FakeDriver, RecordingSink, ScriptedSignal};
use tokio::time::{Instant, sleep};

fn signup(missing_policy_warn: bool) -> Sequence {
	let missing = Step::fill("x").locate(Locator::id("missing-field"));
	let missing = if missing_policy_warn { missing.warn_and_continue() } else { missing };
	Sequence::builder("signup")
		.entry("https://example.com/signup")
		.step(Step::fill("a@b.com").locate(Locator::id("email-field")))
		.step(Step::activate().locate(Locator::id("continue-1")))
		.step(missing)
		.step(Step::activate().locate(Locator::id("continue-2")))
		.build()
		.unwrap()
}

fn signup_page() -> FakeDriver {
	FakeDriver::new()
		.present(Locator::id("email-field"))
		.present(Locator::id("continue-1"))
		.present(Locator::id("continue-2"))
}

fn handler(driver: &FakeDriver, sink: &Arc<RecordingSink>) -> SessionRecoveryHandler {
	SessionRecoveryHandler::new(Box::new(driver.clone())).sink(sink.clone())
}

fn position(events: &[RunEvent], pred: impl Fn(&RunEvent) -> bool) -> usize {
	events.iter().position(pred).expect("event not emitted")
}

#[tokio::test(start_paused = true)]
async fn completed_run_reports_then_holds_then_closes_once() {
	let driver = signup_page().present(Locator::id("missing-field"));
	let sink = Arc::new(RecordingSink::default());

	let summary = handler(&driver, &sink).run_guarded(&signup(false)).await;

	assert_eq!(summary.result, RunResult::Completed);
	assert_eq!(summary.executed, 4);
	assert_eq!(summary.total, 4);
	assert_eq!(driver.closes(), 1);
	assert_eq!(driver.calls().first().unwrap(), "navigate https://example.com/signup");
	assert_eq!(driver.calls().last().unwrap(), "close");

	let events = sink.events();
	let finished = position(&events, |e| matches!(e, RunEvent::RunFinished { .. }));
	let holding = position(&events, |e| matches!(e, RunEvent::AwaitingTeardown { blocking: true, .. }));
	let closed = position(&events, |e| *e == RunEvent::SessionClosed);
	assert!(finished < holding && holding < closed);
}

#[tokio::test(start_paused = true)]
async fn fatal_abort_still_closes_once() {
	let driver = signup_page();
	let sink = Arc::new(RecordingSink::default());

	let summary = handler(&driver, &sink).run_guarded(&signup(false)).await;

	assert_eq!(summary.result, RunResult::aborted("fill missing-field", "resolution exhausted"));
	assert_eq!(summary.executed, 2);
	assert_eq!(summary.steps.len(), 3);
	assert_eq!(summary.steps[2].status, StepStatus::Aborted);
	assert_eq!(summary.result.exit_code(), 1);
	assert_eq!(driver.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn warnings_complete_and_close_once() {
	let driver = signup_page();
	let sink = Arc::new(RecordingSink::default());

	let summary = handler(&driver, &sink).run_guarded(&signup(true)).await;

	assert_eq!(
		summary.result,
		RunResult::CompletedWithWarnings {
			warnings: vec!["fill missing-field".into()],
		}
	);
	assert_eq!(summary.warned, 1);
	assert_eq!(summary.result.exit_code(), 0);
	assert_eq!(driver.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn panic_inside_the_run_becomes_an_abort_and_still_closes() {
	let driver = signup_page().panics_on(Locator::id("continue-1"));
	let sink = Arc::new(RecordingSink::default());

	let summary = handler(&driver, &sink).run_guarded(&signup(false)).await;

	assert_eq!(
		summary.result,
		RunResult::aborted(
			"click continue-1",
			"unexpected failure: agent exploded on attribute[id=continue-1]"
		)
	);
	assert_eq!(driver.closes(), 1);
	assert!(sink.events().contains(&RunEvent::SessionClosed));
}

#[tokio::test(start_paused = true)]
async fn launch_failure_aborts_without_teardown() {
	let driver = FakeDriver::new().launch_fails();
	let sink = Arc::new(RecordingSink::default());

	let summary = handler(&driver, &sink).run_guarded(&signup(false)).await;

	assert_eq!(
		summary.result,
		RunResult::aborted("open session", "session failure: agent launch failed: no agent attached")
	);
	assert_eq!(driver.launches(), 1);
	assert_eq!(driver.closes(), 0);
	let events = sink.events();
	assert!(events.iter().any(|e| matches!(e, RunEvent::SessionFailed { .. })));
	assert!(!events.iter().any(|e| matches!(e, RunEvent::AwaitingTeardown { .. })));
}

#[tokio::test(start_paused = true)]
async fn navigation_failure_aborts_before_any_step() {
	let driver = signup_page().navigation_fails();
	let sink = Arc::new(RecordingSink::default());

	let summary = handler(&driver, &sink).run_guarded(&signup(false)).await;

	assert_eq!(
		summary.result,
		RunResult::aborted("navigate", "navigation failed: net::ERR_NAME_NOT_RESOLVED")
	);
	assert!(summary.steps.is_empty());
	assert_eq!(driver.finds(&Locator::id("email-field")), 0);
	assert_eq!(driver.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn close_failure_is_reported_not_raised() {
	let driver = signup_page().present(Locator::id("missing-field")).close_fails();
	let sink = Arc::new(RecordingSink::default());

	let summary = handler(&driver, &sink).run_guarded(&signup(false)).await;

	assert_eq!(summary.result, RunResult::Completed);
	assert_eq!(driver.closes(), 1);
	assert!(sink.events().contains(&RunEvent::SessionCloseFailed {
		error: "already closed".into(),
	}));
}

#[tokio::test(start_paused = true)]
async fn operator_abort_at_checkpoint_then_teardown_prompt() {
	let driver = signup_page();
	let sink = Arc::new(RecordingSink::default());
	let sequence = Sequence::builder("signup")
		.step(Step::fill("a@b.com").locate(Locator::id("email-field")))
		.checkpoint(Checkpoint::blocking("Solve the CAPTCHA"))
		.step(Step::activate().locate(Locator::id("continue-1")))
		.build()
		.unwrap();
	let (signal, prompts) = ScriptedSignal::new(&[Signal::Abort, Signal::Continue]);

	let summary = handler(&driver, &sink)
		.gate(ManualGate::new(Box::new(signal)))
		.run_guarded(&sequence)
		.await;

	assert_eq!(summary.result, RunResult::aborted("click continue-1", "aborted by operator at checkpoint"));
	assert_eq!(
		prompts.lock().as_slice(),
		["Solve the CAPTCHA", "Inspect the agent, then press ENTER to close it"]
	);
	assert_eq!(driver.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn custom_teardown_gate_and_warmup() {
	let driver = signup_page();
	let sink = Arc::new(RecordingSink::default());
	let sequence = Sequence::builder("warm")
		.entry("com.example.app/.MainActivity")
		.warmup(Duration::from_secs(3))
		.step(Step::activate().locate(Locator::id("continue-1")))
		.build()
		.unwrap();

	let summary = handler(&driver, &sink)
		.teardown(Checkpoint::bounded("closing", Duration::from_secs(1)))
		.run_guarded(&sequence)
		.await;

	assert_eq!(summary.result, RunResult::Completed);
	let events = sink.events();
	assert!(events.contains(&RunEvent::WarmingUp {
		wait: Duration::from_secs(3),
	}));
	assert!(events.iter().any(|e| matches!(e, RunEvent::AwaitingTeardown { blocking: false, .. })));
	assert_eq!(driver.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn interrupt_during_teardown_closes_once_without_waiting_out_the_fallback() {
	let driver = signup_page().present(Locator::id("missing-field"));
	let sink = Arc::new(RecordingSink::default());
	let interrupt = Interrupt::new();
	let remote = interrupt.clone();
	// the run itself settles for 8 s; the request lands while teardown waits
	tokio::spawn(async move {
		sleep(Duration::from_secs(20)).await;
		remote.trigger();
	});

	let started = Instant::now();
	let summary = handler(&driver, &sink)
		.gate(ManualGate::unattended().with_fallback(Duration::from_secs(60)))
		.interrupt(interrupt)
		.run_guarded(&signup(false))
		.await;

	assert_eq!(summary.result, RunResult::Completed);
	assert_eq!(driver.closes(), 1);
	assert!(started.elapsed() < Duration::from_secs(21), "waited {:?}", started.elapsed());
	assert_eq!(sink.events().last(), Some(&RunEvent::SessionClosed));
}
