//! Counter backends for fixed-window accounting

use crate::ThrottleError;
use crate::time_provider::{SystemTimeProvider, TimeProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

/// Atomic counter-per-window storage.
///
/// `increment` that observes a post-increment count of 1 is the call that
/// creates the window and arms its expiry; all later increments within the
/// window only bump the counter. Counts are monotonically non-decreasing
/// within a window.
#[async_trait]
pub trait CounterBackend: Send + Sync {
	/// Increment the counter for `key`, returning the post-increment count
	async fn increment(&self, key: &str, window: Duration) -> Result<u64, ThrottleError>;

	/// Current count for `key`, zero when no window exists
	async fn count(&self, key: &str) -> Result<u64, ThrottleError>;

	/// Remaining time until the window for `key` resets
	async fn time_to_reset(&self, key: &str) -> Result<Option<Duration>, ThrottleError>;

	/// Drop the window for `key`
	async fn reset(&self, key: &str) -> Result<(), ThrottleError>;

	/// Drop expired windows, returning how many were removed.
	///
	/// Stores with native key expiry need no sweep and keep the default.
	async fn purge_expired(&self) -> Result<usize, ThrottleError> {
		Ok(0)
	}
}

/// Window state tracked per rate-limit key in the memory backend
#[derive(Clone)]
struct WindowEntry {
	count: u64,
	window_start: Instant,
	window: Duration,
}

impl WindowEntry {
	fn is_expired(&self, now: Instant) -> bool {
		now.duration_since(self.window_start) >= self.window
	}
}

/// In-process counter backend keyed by wall-clock window start.
///
/// Used both standalone (redis-less deployments, tests) and as the
/// fallback tier behind the Redis backend. Expired windows linger until
/// the next increment for their key or a `purge_expired` sweep.
#[derive(Clone)]
pub struct MemoryCounterBackend<T: TimeProvider = SystemTimeProvider> {
	storage: Arc<RwLock<HashMap<String, WindowEntry>>>,
	time_provider: Arc<T>,
}

impl MemoryCounterBackend<SystemTimeProvider> {
	/// Creates a backend on the system clock
	pub fn new() -> Self {
		Self {
			storage: Arc::new(RwLock::new(HashMap::new())),
			time_provider: Arc::new(SystemTimeProvider::new()),
		}
	}
}

impl<T: TimeProvider> MemoryCounterBackend<T> {
	/// Create a backend with a custom time provider
	pub fn with_time_provider(time_provider: Arc<T>) -> Self {
		Self {
			storage: Arc::new(RwLock::new(HashMap::new())),
			time_provider,
		}
	}
}

impl Default for MemoryCounterBackend<SystemTimeProvider> {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl<T: TimeProvider> CounterBackend for MemoryCounterBackend<T> {
	async fn increment(&self, key: &str, window: Duration) -> Result<u64, ThrottleError> {
		let mut storage = self.storage.write().await;
		let now = self.time_provider.now();

		match storage.get_mut(key) {
			Some(entry) if !entry.is_expired(now) => {
				entry.count += 1;
				Ok(entry.count)
			}
			_ => {
				storage.insert(
					key.to_string(),
					WindowEntry {
						count: 1,
						window_start: now,
						window,
					},
				);
				Ok(1)
			}
		}
	}

	async fn count(&self, key: &str) -> Result<u64, ThrottleError> {
		let storage = self.storage.read().await;
		let now = self.time_provider.now();
		Ok(storage
			.get(key)
			.filter(|entry| !entry.is_expired(now))
			.map(|entry| entry.count)
			.unwrap_or(0))
	}

	async fn time_to_reset(&self, key: &str) -> Result<Option<Duration>, ThrottleError> {
		let storage = self.storage.read().await;
		let now = self.time_provider.now();
		Ok(storage.get(key).and_then(|entry| {
			let elapsed = now.duration_since(entry.window_start);
			entry.window.checked_sub(elapsed).filter(|d| !d.is_zero())
		}))
	}

	async fn reset(&self, key: &str) -> Result<(), ThrottleError> {
		let mut storage = self.storage.write().await;
		storage.remove(key);
		Ok(())
	}

	async fn purge_expired(&self) -> Result<usize, ThrottleError> {
		let mut storage = self.storage.write().await;
		let now = self.time_provider.now();
		let before = storage.len();
		storage.retain(|_, entry| !entry.is_expired(now));
		Ok(before - storage.len())
	}
}

/// Redis-backed counter using INCR + PEXPIRE.
///
/// The expiry is armed only by the increment that creates the counter
/// (post-increment count of 1), matching the fixed-window contract.
#[cfg(feature = "redis-backend")]
pub struct RedisCounterBackend {
	client: redis::Client,
}

#[cfg(feature = "redis-backend")]
impl RedisCounterBackend {
	/// Creates a backend connected to the specified Redis URL.
	///
	/// # Examples
	///
	/// ```no_run
	/// use souk_throttling::RedisCounterBackend;
	///
	/// let backend = RedisCounterBackend::new("redis://127.0.0.1:6379").unwrap();
	/// ```
	pub fn new(url: &str) -> Result<Self, ThrottleError> {
		let client =
			redis::Client::open(url).map_err(|e| ThrottleError::Backend(e.to_string()))?;
		Ok(Self { client })
	}

	async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, ThrottleError> {
		self.client
			.get_multiplexed_async_connection()
			.await
			.map_err(|e| ThrottleError::Backend(e.to_string()))
	}
}

#[cfg(feature = "redis-backend")]
#[async_trait]
impl CounterBackend for RedisCounterBackend {
	async fn increment(&self, key: &str, window: Duration) -> Result<u64, ThrottleError> {
		use redis::AsyncCommands;
		let mut conn = self.connection().await?;
		let count: u64 = conn
			.incr(key, 1)
			.await
			.map_err(|e| ThrottleError::Backend(e.to_string()))?;
		if count == 1 {
			let _: bool = redis::cmd("PEXPIRE")
				.arg(key)
				.arg(window.as_millis() as u64)
				.query_async(&mut conn)
				.await
				.map_err(|e| ThrottleError::Backend(e.to_string()))?;
		}
		Ok(count)
	}

	async fn count(&self, key: &str) -> Result<u64, ThrottleError> {
		use redis::AsyncCommands;
		let mut conn = self.connection().await?;
		let count: Option<u64> = conn
			.get(key)
			.await
			.map_err(|e| ThrottleError::Backend(e.to_string()))?;
		Ok(count.unwrap_or(0))
	}

	async fn time_to_reset(&self, key: &str) -> Result<Option<Duration>, ThrottleError> {
		let mut conn = self.connection().await?;
		let millis: i64 = redis::cmd("PTTL")
			.arg(key)
			.query_async(&mut conn)
			.await
			.map_err(|e| ThrottleError::Backend(e.to_string()))?;
		if millis > 0 {
			Ok(Some(Duration::from_millis(millis as u64)))
		} else {
			Ok(None)
		}
	}

	async fn reset(&self, key: &str) -> Result<(), ThrottleError> {
		use redis::AsyncCommands;
		let mut conn = self.connection().await?;
		let _: u64 = conn
			.del(key)
			.await
			.map_err(|e| ThrottleError::Backend(e.to_string()))?;
		Ok(())
	}
}

/// Test-only backend that fails every operation, standing in for an
/// unreachable Redis
#[cfg(test)]
pub(crate) struct FailingCounterBackend;

#[cfg(test)]
#[async_trait]
impl CounterBackend for FailingCounterBackend {
	async fn increment(&self, _key: &str, _window: Duration) -> Result<u64, ThrottleError> {
		Err(ThrottleError::Backend("connection refused".to_string()))
	}

	async fn count(&self, _key: &str) -> Result<u64, ThrottleError> {
		Err(ThrottleError::Backend("connection refused".to_string()))
	}

	async fn time_to_reset(&self, _key: &str) -> Result<Option<Duration>, ThrottleError> {
		Err(ThrottleError::Backend("connection refused".to_string()))
	}

	async fn reset(&self, _key: &str) -> Result<(), ThrottleError> {
		Err(ThrottleError::Backend("connection refused".to_string()))
	}
}
