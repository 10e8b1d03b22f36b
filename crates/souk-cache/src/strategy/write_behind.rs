//! Write-behind strategy

use crate::distributed::DistributedCache;
use crate::error::{CacheError, Result};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(5000);

type PersistCallback = Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct PendingWrite {
	value: serde_json::Value,
	persist: PersistCallback,
	timer: AbortHandle,
}

/// Write path that caches immediately and defers the authoritative persist.
///
/// Each `set` writes the cache synchronously and schedules the persist
/// callback after the batch delay (default 5000 ms). Repeated sets to the
/// same key within the delay cancel the pending timer and reschedule, so
/// only the most recent value is ever persisted: last write wins within the
/// delay window, not FIFO. A crash inside the window loses the unpersisted
/// write; that risk is the point of the trade.
///
/// Deferred persists are fire-and-forget: their failures are logged, never
/// surfaced to the caller that scheduled them. [`flush`](Self::flush)
/// forces everything pending to persist now.
#[derive(Clone)]
pub struct WriteBehind {
	cache: DistributedCache,
	delay: Duration,
	pending: Arc<Mutex<HashMap<String, PendingWrite>>>,
}

impl WriteBehind {
	pub fn new(cache: DistributedCache) -> Self {
		Self {
			cache,
			delay: DEFAULT_BATCH_DELAY,
			pending: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Override the batch delay
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	/// Cache the value now and schedule `persist` after the batch delay,
	/// coalescing with any pending write to the same key
	pub async fn set<T, P, Fut>(
		&self,
		key: &str,
		value: &T,
		ttl_secs: u64,
		persist: P,
	) -> Result<()>
	where
		T: Serialize,
		P: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		self.cache.set(key, value, ttl_secs).await;

		let json = serde_json::to_value(value)
			.map_err(|e| CacheError::Serialization(e.to_string()))?;
		let callback: PersistCallback = Arc::new(move |v| Box::pin(persist(v)));

		let mut pending = self.pending.lock().await;

		// Restart, not accumulate: the previous timer for this key is dead
		if let Some(old) = pending.remove(key) {
			old.timer.abort();
		}

		let delay = self.delay;
		let pending_map = Arc::clone(&self.pending);
		let timer_key = key.to_string();
		let timer = tokio::spawn(async move {
			tokio::time::sleep(delay).await;
			let entry = {
				let mut pending = pending_map.lock().await;
				pending.remove(&timer_key)
			};
			if let Some(entry) = entry {
				if let Err(e) = (entry.persist)(entry.value).await {
					tracing::warn!(key = %timer_key, error = %e, "deferred persist failed");
				}
			}
		})
		.abort_handle();

		pending.insert(
			key.to_string(),
			PendingWrite {
				value: json,
				persist: callback,
				timer,
			},
		);
		Ok(())
	}

	/// Persist every pending write immediately, returning how many succeeded
	pub async fn flush(&self) -> usize {
		let drained: Vec<(String, PendingWrite)> = {
			let mut pending = self.pending.lock().await;
			pending.drain().collect()
		};

		let mut persisted = 0;
		for (key, entry) in drained {
			entry.timer.abort();
			match (entry.persist)(entry.value).await {
				Ok(()) => persisted += 1,
				Err(e) => tracing::warn!(key = %key, error = %e, "flush persist failed"),
			}
		}
		persisted
	}

	/// Number of writes currently waiting on their batch delay
	pub async fn pending(&self) -> usize {
		self.pending.lock().await.len()
	}
}
