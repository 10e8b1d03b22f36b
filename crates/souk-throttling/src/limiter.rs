//! Fixed-window rate limiter with fail-open degradation

use crate::ThrottleError;
use crate::backend::{CounterBackend, MemoryCounterBackend};
use std::sync::{Arc, Mutex};
use tokio::task::AbortHandle;
use tokio::time::Duration;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Maximum request count per window for one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
	pub max_requests: u64,
	pub window: Duration,
}

impl RateLimitConfig {
	pub fn new(max_requests: u64, window: Duration) -> Self {
		Self {
			max_requests,
			window,
		}
	}
}

/// Outcome of one rate-limit check, carrying everything a caller needs
/// to emit `X-RateLimit-*` and `Retry-After` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
	pub allowed: bool,
	pub limit: u64,
	pub remaining: u64,
	pub reset_after: Duration,
}

/// Fixed-window rate limiter over a counter backend.
///
/// Counts requests per `(identifier, window-length)` key. When the primary
/// backend fails the check falls back to an in-process counter, and when
/// that fails too the request is allowed: rate limiting degrades to
/// fail-open rather than taking the API down with it.
///
/// # Examples
///
/// ```
/// use souk_throttling::{MemoryCounterBackend, RateLimitConfig, RateLimiter};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let limiter = RateLimiter::new(Arc::new(MemoryCounterBackend::new()));
/// let config = RateLimitConfig::new(100, Duration::from_secs(60));
///
/// assert!(limiter.check("203.0.113.9", &config).await);
/// # });
/// ```
pub struct RateLimiter {
	primary: Arc<dyn CounterBackend>,
	fallback: MemoryCounterBackend,
	sweeper_handle: Mutex<Option<AbortHandle>>,
}

impl RateLimiter {
	/// Creates a limiter over the given primary backend
	pub fn new(primary: Arc<dyn CounterBackend>) -> Self {
		Self {
			primary,
			fallback: MemoryCounterBackend::new(),
			sweeper_handle: Mutex::new(None),
		}
	}

	fn window_key(identifier: &str, config: &RateLimitConfig) -> String {
		format!("ratelimit:{}:{}", identifier, config.window.as_millis())
	}

	/// Checks whether a request from `identifier` is within its limit.
	///
	/// Counts the request as a side effect: every call consumes one slot
	/// in the current window.
	pub async fn check(&self, identifier: &str, config: &RateLimitConfig) -> bool {
		self.check_detailed(identifier, config).await.allowed
	}

	/// Like [`check`](Self::check), but returns the full decision for
	/// response headers.
	pub async fn check_detailed(
		&self,
		identifier: &str,
		config: &RateLimitConfig,
	) -> RateLimitDecision {
		let key = Self::window_key(identifier, config);

		let count = match self.primary.increment(&key, config.window).await {
			Ok(count) => count,
			Err(e) => {
				tracing::warn!(identifier, error = %e, "primary rate-limit backend failed, using in-process fallback");
				match self.fallback.increment(&key, config.window).await {
					Ok(count) => count,
					Err(e) => {
						tracing::error!(identifier, error = %e, "rate-limit fallback failed, allowing request");
						return RateLimitDecision {
							allowed: true,
							limit: config.max_requests,
							remaining: config.max_requests,
							reset_after: config.window,
						};
					}
				}
			}
		};

		RateLimitDecision {
			allowed: count <= config.max_requests,
			limit: config.max_requests,
			remaining: config.max_requests.saturating_sub(count),
			reset_after: self.reset_time(identifier, config).await,
		}
	}

	/// Remaining time until the identifier's current window resets.
	///
	/// Returns the full window length when no window is active, which is
	/// the longest a denied client could need to wait.
	pub async fn reset_time(&self, identifier: &str, config: &RateLimitConfig) -> Duration {
		let key = Self::window_key(identifier, config);
		let remaining = match self.primary.time_to_reset(&key).await {
			Ok(remaining) => remaining,
			Err(_) => self.fallback.time_to_reset(&key).await.unwrap_or(None),
		};
		remaining.unwrap_or(config.window)
	}

	/// Current request count for the identifier's window, without
	/// consuming a slot
	pub async fn count(&self, identifier: &str, config: &RateLimitConfig) -> u64 {
		let key = Self::window_key(identifier, config);
		match self.primary.count(&key).await {
			Ok(count) => count,
			Err(_) => self.fallback.count(&key).await.unwrap_or(0),
		}
	}

	/// Drops the identifier's window from both backends
	pub async fn reset(&self, identifier: &str, config: &RateLimitConfig) {
		let key = Self::window_key(identifier, config);
		if let Err(e) = self.primary.reset(&key).await {
			tracing::warn!(identifier, error = %e, "failed to reset primary rate-limit window");
		}
		if let Err(e) = self.fallback.reset(&key).await {
			tracing::warn!(identifier, error = %e, "failed to reset fallback rate-limit window");
		}
	}

	/// Starts a background sweep that purges expired fallback windows
	/// every five minutes
	pub fn start_sweeper(self: &Arc<Self>) {
		self.start_sweeper_with_interval(DEFAULT_SWEEP_INTERVAL);
	}

	/// Starts the background sweep with a custom interval
	pub fn start_sweeper_with_interval(self: &Arc<Self>, interval: Duration) {
		let limiter = Arc::clone(self);
		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.tick().await;
			loop {
				ticker.tick().await;
				match limiter.fallback.purge_expired().await {
					Ok(purged) if purged > 0 => {
						tracing::debug!(purged, "swept expired rate-limit windows");
					}
					Ok(_) => {}
					Err(e) => {
						tracing::warn!(error = %e, "rate-limit sweep failed");
					}
				}
			}
		})
		.abort_handle();

		let mut guard = self
			.sweeper_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(old) = guard.replace(handle) {
			old.abort();
		}
	}

	/// Stops the background sweep if one is running
	pub fn stop_sweeper(&self) {
		let mut guard = self
			.sweeper_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(handle) = guard.take() {
			handle.abort();
		}
	}
}

impl Drop for RateLimiter {
	fn drop(&mut self) {
		self.stop_sweeper();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::FailingCounterBackend;
	use crate::time_provider::MockTimeProvider;

	fn limiter_with_clock(clock: Arc<MockTimeProvider>) -> RateLimiter {
		RateLimiter::new(Arc::new(MemoryCounterBackend::with_time_provider(clock)))
	}

	#[tokio::test]
	async fn test_allows_up_to_limit_then_denies() {
		let limiter = RateLimiter::new(Arc::new(MemoryCounterBackend::new()));
		let config = RateLimitConfig::new(5, Duration::from_secs(60));

		for _ in 0..5 {
			assert!(limiter.check("client-a", &config).await);
		}
		assert!(!limiter.check("client-a", &config).await);
	}

	#[tokio::test]
	async fn test_window_expiry_resets_allowance() {
		let clock = Arc::new(MockTimeProvider::default());
		let limiter = limiter_with_clock(clock.clone());
		let config = RateLimitConfig::new(2, Duration::from_secs(1));

		assert!(limiter.check("client-a", &config).await);
		assert!(limiter.check("client-a", &config).await);
		assert!(!limiter.check("client-a", &config).await);

		clock.advance(Duration::from_millis(1100));
		assert!(limiter.check("client-a", &config).await);
	}

	#[tokio::test]
	async fn test_identifiers_do_not_share_windows() {
		let limiter = RateLimiter::new(Arc::new(MemoryCounterBackend::new()));
		let config = RateLimitConfig::new(1, Duration::from_secs(60));

		assert!(limiter.check("client-a", &config).await);
		assert!(!limiter.check("client-a", &config).await);
		assert!(limiter.check("client-b", &config).await);
	}

	#[tokio::test]
	async fn test_decision_carries_header_fields() {
		let limiter = RateLimiter::new(Arc::new(MemoryCounterBackend::new()));
		let config = RateLimitConfig::new(3, Duration::from_secs(60));

		let decision = limiter.check_detailed("client-a", &config).await;
		assert!(decision.allowed);
		assert_eq!(decision.limit, 3);
		assert_eq!(decision.remaining, 2);
		assert!(decision.reset_after <= Duration::from_secs(60));

		limiter.check("client-a", &config).await;
		limiter.check("client-a", &config).await;
		let denied = limiter.check_detailed("client-a", &config).await;
		assert!(!denied.allowed);
		assert_eq!(denied.remaining, 0);
	}

	#[tokio::test]
	async fn test_failed_primary_falls_back_to_memory() {
		let limiter = RateLimiter::new(Arc::new(FailingCounterBackend));
		let config = RateLimitConfig::new(2, Duration::from_secs(60));

		// Fallback still enforces the limit
		assert!(limiter.check("client-a", &config).await);
		assert!(limiter.check("client-a", &config).await);
		assert!(!limiter.check("client-a", &config).await);
	}

	#[tokio::test]
	async fn test_count_does_not_consume_a_slot() {
		let limiter = RateLimiter::new(Arc::new(MemoryCounterBackend::new()));
		let config = RateLimitConfig::new(5, Duration::from_secs(60));

		limiter.check("client-a", &config).await;
		assert_eq!(limiter.count("client-a", &config).await, 1);
		assert_eq!(limiter.count("client-a", &config).await, 1);
	}

	#[tokio::test]
	async fn test_reset_reopens_the_window() {
		let limiter = RateLimiter::new(Arc::new(MemoryCounterBackend::new()));
		let config = RateLimitConfig::new(1, Duration::from_secs(60));

		assert!(limiter.check("client-a", &config).await);
		assert!(!limiter.check("client-a", &config).await);

		limiter.reset("client-a", &config).await;
		assert!(limiter.check("client-a", &config).await);
	}

	#[tokio::test]
	async fn test_reset_time_counts_down() {
		let clock = Arc::new(MockTimeProvider::default());
		let limiter = limiter_with_clock(clock.clone());
		let config = RateLimitConfig::new(5, Duration::from_secs(10));

		limiter.check("client-a", &config).await;
		clock.advance(Duration::from_secs(4));
		assert_eq!(
			limiter.reset_time("client-a", &config).await,
			Duration::from_secs(6)
		);
	}

	#[tokio::test]
	async fn test_sweeper_start_stop() {
		let limiter = Arc::new(RateLimiter::new(Arc::new(MemoryCounterBackend::new())));
		limiter.start_sweeper_with_interval(Duration::from_millis(10));
		limiter.stop_sweeper();
		// stop is idempotent
		limiter.stop_sweeper();
	}
}
