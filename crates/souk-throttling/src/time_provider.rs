//! Time source abstraction for window bookkeeping
//!
//! Fixed-window accounting needs a clock; tests need to move it by hand.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::Instant;

/// Trait for providing time information to counter backends.
/// This allows for time mocking in tests.
pub trait TimeProvider: Send + Sync {
	fn now(&self) -> Instant;
}

/// System time provider that uses the actual system clock.
#[derive(Clone, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
	pub fn new() -> Self {
		Self
	}
}

impl TimeProvider for SystemTimeProvider {
	fn now(&self) -> Instant {
		Instant::now()
	}
}

/// Mock time provider for testing that allows manual time control.
#[derive(Clone)]
pub struct MockTimeProvider {
	current_time: Arc<RwLock<Instant>>,
}

impl MockTimeProvider {
	pub fn new(start_time: Instant) -> Self {
		Self {
			current_time: Arc::new(RwLock::new(start_time)),
		}
	}

	pub fn advance(&self, duration: std::time::Duration) {
		let mut time = self.current_time.write();
		*time += duration;
	}
}

impl Default for MockTimeProvider {
	fn default() -> Self {
		Self::new(Instant::now())
	}
}

impl TimeProvider for MockTimeProvider {
	fn now(&self) -> Instant {
		*self.current_time.read()
	}
}
