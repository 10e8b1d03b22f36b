//! Access-frequency-adaptive TTL

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

/// Per-key access tracking that stretches TTLs for hot keys.
///
/// Multipliers: more than 100 accesses → 4x, more than 50 → 2x, more than
/// 10 → 1.5x, otherwise the base TTL. Counts are reset in bulk (typically
/// on a schedule) so hotness decays instead of accumulating forever.
///
/// # Examples
///
/// ```
/// use souk_cache::AdaptiveTtl;
/// use std::time::Duration;
///
/// # async fn example() {
/// let adaptive = AdaptiveTtl::new();
/// for _ in 0..60 {
///     adaptive.record_access("product:1").await;
/// }
/// let ttl = adaptive.ttl_for("product:1", Duration::from_secs(300)).await;
/// assert_eq!(ttl, Duration::from_secs(600));
/// # }
/// ```
#[derive(Clone)]
pub struct AdaptiveTtl {
	counts: Arc<RwLock<HashMap<String, u64>>>,
	reset_handle: Arc<std::sync::Mutex<Option<AbortHandle>>>,
}

impl AdaptiveTtl {
	pub fn new() -> Self {
		Self {
			counts: Arc::new(RwLock::new(HashMap::new())),
			reset_handle: Arc::new(std::sync::Mutex::new(None)),
		}
	}

	/// Record one access, returning the updated count
	pub async fn record_access(&self, key: &str) -> u64 {
		let mut counts = self.counts.write().await;
		let count = counts.entry(key.to_string()).or_insert(0);
		*count += 1;
		*count
	}

	fn multiplier(count: u64) -> f64 {
		if count > 100 {
			4.0
		} else if count > 50 {
			2.0
		} else if count > 10 {
			1.5
		} else {
			1.0
		}
	}

	/// TTL for a key given its current access count
	pub async fn ttl_for(&self, key: &str, base: Duration) -> Duration {
		let counts = self.counts.read().await;
		let count = counts.get(key).copied().unwrap_or(0);
		base.mul_f64(Self::multiplier(count))
	}

	/// Drop all access counts so hotness decays
	pub async fn reset_counts(&self) {
		let mut counts = self.counts.write().await;
		counts.clear();
	}

	/// Number of keys currently tracked
	pub async fn tracked_keys(&self) -> usize {
		self.counts.read().await.len()
	}

	/// Reset counts on a schedule to bound memory and age out hotness.
	///
	/// Restarting replaces any previously running reset task.
	pub fn start_auto_reset(&self, interval: Duration) {
		let mut handle_guard = self
			.reset_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());

		if let Some(existing) = handle_guard.take() {
			existing.abort();
		}

		let tracker = self.clone();
		let abort_handle = tokio::spawn(async move {
			let mut interval_timer = tokio::time::interval(interval);
			loop {
				interval_timer.tick().await;
				tracker.reset_counts().await;
			}
		})
		.abort_handle();

		*handle_guard = Some(abort_handle);
	}

	/// Stop the scheduled reset task if one is running
	pub fn stop_auto_reset(&self) {
		let mut handle_guard = self
			.reset_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(handle) = handle_guard.take() {
			handle.abort();
		}
	}
}

impl Default for AdaptiveTtl {
	fn default() -> Self {
		Self::new()
	}
}
