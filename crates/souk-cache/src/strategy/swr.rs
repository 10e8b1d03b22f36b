//! Stale-while-revalidate strategy

use crate::distributed::DistributedCache;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Value stored with its own insertion timestamp.
///
/// The cache layer's TTL cannot distinguish "fresh" from "stale but
/// usable", so each value carries the data needed to compute its age and
/// its current stale window at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Timestamped<T> {
	value: T,
	inserted_at_ms: u64,
	stale_ttl_secs: u64,
}

fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

/// Serve cached data past freshness while refreshing it in the background.
///
/// Reads resolve by age: fresh values (`age < ttl`) return directly; stale
/// but usable values (`ttl <= age < stale_ttl`) return immediately while a
/// single background revalidation refreshes the entry with a new timestamp
/// and a doubled stale window; expired values (`age >= stale_ttl`) block on
/// a synchronous fetch.
///
/// Revalidations are deduplicated per key: concurrent stale reads trigger
/// exactly one background fetch.
#[derive(Clone)]
pub struct StaleWhileRevalidate {
	cache: DistributedCache,
	in_flight: Arc<Mutex<HashSet<String>>>,
}

impl StaleWhileRevalidate {
	pub fn new(cache: DistributedCache) -> Self {
		Self {
			cache,
			in_flight: Arc::new(Mutex::new(HashSet::new())),
		}
	}

	/// Read through the freshness window logic.
	///
	/// `ttl_secs` bounds freshness, `stale_ttl_secs` bounds usability; past
	/// the latter the fetch happens synchronously.
	pub async fn get<T, F, Fut>(
		&self,
		key: &str,
		ttl_secs: u64,
		stale_ttl_secs: u64,
		fetch: F,
	) -> Result<T>
	where
		T: Serialize + DeserializeOwned + Send + Sync + 'static,
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T>> + Send + 'static,
	{
		let stored: Option<Timestamped<T>> = self.cache.get(key).await;

		let Some(stored) = stored else {
			return self.fetch_and_store(key, stale_ttl_secs, fetch).await;
		};

		let age_secs = now_ms().saturating_sub(stored.inserted_at_ms) / 1000;

		if age_secs < ttl_secs {
			return Ok(stored.value);
		}

		if age_secs < stored.stale_ttl_secs.max(stale_ttl_secs) {
			self.spawn_revalidation(key, stale_ttl_secs, fetch).await;
			return Ok(stored.value);
		}

		self.fetch_and_store(key, stale_ttl_secs, fetch).await
	}

	async fn fetch_and_store<T, F, Fut>(
		&self,
		key: &str,
		stale_ttl_secs: u64,
		fetch: F,
	) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let value = fetch().await?;
		let entry = Timestamped {
			value,
			inserted_at_ms: now_ms(),
			stale_ttl_secs,
		};
		self.cache.set(key, &entry, stale_ttl_secs).await;
		Ok(entry.value)
	}

	/// Fire exactly one background refresh per key; concurrent stale reads
	/// piggyback on the in-flight one
	async fn spawn_revalidation<T, F, Fut>(&self, key: &str, stale_ttl_secs: u64, fetch: F)
	where
		T: Serialize + DeserializeOwned + Send + Sync + 'static,
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Result<T>> + Send + 'static,
	{
		{
			let mut in_flight = self.in_flight.lock().await;
			if !in_flight.insert(key.to_string()) {
				return;
			}
		}

		let cache = self.cache.clone();
		let in_flight = Arc::clone(&self.in_flight);
		let key = key.to_string();
		tokio::spawn(async move {
			match fetch().await {
				Ok(value) => {
					let entry = Timestamped {
						value,
						inserted_at_ms: now_ms(),
						// Successful revalidation earns a doubled stale window
						stale_ttl_secs: stale_ttl_secs * 2,
					};
					cache.set(&key, &entry, stale_ttl_secs * 2).await;
				}
				Err(e) => {
					tracing::warn!(key = %key, error = %e, "background revalidation failed");
				}
			}
			in_flight.lock().await.remove(&key);
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::remote::InMemoryRemoteStore;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	fn strategy() -> (StaleWhileRevalidate, DistributedCache) {
		let cache =
			DistributedCache::new(Arc::new(InMemoryRemoteStore::new()), "souk", "test");
		(StaleWhileRevalidate::new(cache.clone()), cache)
	}

	/// Seed a value whose insertion timestamp lies `age_secs` in the past
	async fn seed(cache: &DistributedCache, key: &str, value: &str, age_secs: u64, stale_ttl: u64) {
		let entry = Timestamped {
			value: value.to_string(),
			inserted_at_ms: now_ms() - age_secs * 1000,
			stale_ttl_secs: stale_ttl,
		};
		cache.set(key, &entry, stale_ttl).await;
	}

	#[tokio::test]
	async fn test_miss_fetches_synchronously() {
		let (strategy, _) = strategy();

		let value: String = strategy
			.get("k", 1, 10, || async { Ok("fresh".to_string()) })
			.await
			.unwrap();
		assert_eq!(value, "fresh");
	}

	#[tokio::test]
	async fn test_fresh_value_skips_fetch() {
		let (strategy, cache) = strategy();
		seed(&cache, "k", "cached", 0, 10).await;

		let value: String = strategy
			.get("k", 5, 10, || async { panic!("fetch must not run while fresh") })
			.await
			.unwrap();
		assert_eq!(value, "cached");
	}

	#[tokio::test]
	async fn test_stale_value_returned_and_revalidated_once() {
		let (strategy, cache) = strategy();
		// age 3s: past the 1s freshness window, inside the 10s stale window
		seed(&cache, "k", "stale-value", 3, 10).await;

		let fetches = Arc::new(AtomicUsize::new(0));
		let fetches_clone = Arc::clone(&fetches);

		let value: String = strategy
			.get("k", 1, 10, move || {
				let fetches = fetches_clone;
				async move {
					fetches.fetch_add(1, Ordering::SeqCst);
					Ok("refreshed".to_string())
				}
			})
			.await
			.unwrap();

		// Stale value served immediately, unchanged
		assert_eq!(value, "stale-value");

		// Exactly one background revalidation lands with a fresh timestamp
		let mut refreshed = false;
		for _ in 0..50 {
			let stored: Option<Timestamped<String>> = cache.get("k").await;
			if let Some(stored) = stored {
				if stored.value == "refreshed" {
					assert_eq!(stored.stale_ttl_secs, 20); // doubled window
					refreshed = true;
					break;
				}
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		assert!(refreshed);
		assert_eq!(fetches.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_concurrent_stale_reads_trigger_one_fetch() {
		let (strategy, cache) = strategy();
		seed(&cache, "k", "stale", 3, 60).await;

		let fetches = Arc::new(AtomicUsize::new(0));

		for _ in 0..5 {
			let fetches = Arc::clone(&fetches);
			let value: String = strategy
				.get("k", 1, 60, move || async move {
					fetches.fetch_add(1, Ordering::SeqCst);
					// Hold the in-flight slot while the other reads arrive
					tokio::time::sleep(Duration::from_millis(50)).await;
					Ok("refreshed".to_string())
				})
				.await
				.unwrap();
			assert_eq!(value, "stale");
		}

		tokio::time::sleep(Duration::from_millis(100)).await;
		assert_eq!(fetches.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_expired_value_fetched_synchronously() {
		let (strategy, cache) = strategy();
		// age 15s: past the 10s stale window
		seed(&cache, "k", "ancient", 15, 10).await;

		let value: String = strategy
			.get("k", 1, 10, || async { Ok("fresh".to_string()) })
			.await
			.unwrap();
		assert_eq!(value, "fresh");
	}
}
