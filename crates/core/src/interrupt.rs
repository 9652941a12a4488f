use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

/// Operator interrupt requests.
///
/// The sequencer polls [`is_triggered`](Self::is_triggered) between steps and before
/// checkpoints; gates await [`triggered`](Self::triggered) so a request cuts any wait short.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<Inner>);

#[derive(Debug, Default)]
struct Inner {
	requests: AtomicUsize,
	notify: Notify,
}

impl Interrupt {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn trigger(&self) {
		self.0.requests.fetch_add(1, Ordering::SeqCst);
		self.0.notify.notify_waiters();
	}

	pub fn is_triggered(&self) -> bool {
		self.0.requests.load(Ordering::SeqCst) > 0
	}

	/// Resolves on the first request made after this future is first polled.
	pub async fn triggered(&self) {
		let seen = self.0.requests.load(Ordering::SeqCst);
		loop {
			let notified = self.0.notify.notified();
			tokio::pin!(notified);
			notified.as_mut().enable();
			if self.0.requests.load(Ordering::SeqCst) != seen {
				return;
			}
			notified.await;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::time::{Instant, sleep};

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn triggered_waits_for_a_new_request() {
		let interrupt = Interrupt::new();
		interrupt.trigger();
		assert!(interrupt.is_triggered());

		let remote = interrupt.clone();
		tokio::spawn(async move {
			sleep(Duration::from_secs(3)).await;
			remote.trigger();
		});

		let started = Instant::now();
		interrupt.triggered().await;
		assert!(started.elapsed() >= Duration::from_secs(3));
	}
}
