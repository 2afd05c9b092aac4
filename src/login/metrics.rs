// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for login attempts.
#[derive(Debug, Default)]
pub struct LoginMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	replay_rejected: AtomicU64,
}
impl LoginMetrics {
	/// Returns the total number of begin and complete attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of successful attempts.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed attempts.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of callbacks whose state was unknown, consumed, or expired.
	pub fn replays_rejected(&self) -> u64 {
		self.replay_rejected.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_replay_rejected(&self) {
		self.replay_rejected.fetch_add(1, Ordering::Relaxed);
	}
}
