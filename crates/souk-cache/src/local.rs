//! In-process LRU cache with per-entry TTL

use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use lru::LruCache;
use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

const DEFAULT_CAPACITY: usize = 1000;

/// Snapshot of a [`LocalCache`]'s state and hit/miss counters
#[derive(Debug, Clone)]
pub struct LocalCacheStats {
	/// Current number of entries
	pub size: usize,
	/// Maximum number of entries before LRU eviction
	pub capacity: usize,
	/// Default TTL applied when `set` is called without one
	pub default_ttl: Option<Duration>,
	/// Number of cache hits
	pub hits: u64,
	/// Number of cache misses
	pub misses: u64,
}

impl LocalCacheStats {
	/// Hit rate between 0.0 and 1.0
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses;
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}
}

/// Bounded in-process cache with least-recently-used eviction.
///
/// Every `get` promotes the entry's recency (but never extends its TTL) and
/// records a hit or miss into lock-free counters. When the cache grows past
/// its capacity, the least-recently-accessed entry is dropped.
///
/// # Examples
///
/// ```
/// use souk_cache::LocalCache;
/// use std::time::Duration;
///
/// # async fn example() {
/// let cache = LocalCache::with_capacity(100)
///     .with_default_ttl(Duration::from_secs(300));
///
/// cache.set("product:1", &"Teapot", None).await.unwrap();
/// let value: Option<String> = cache.get("product:1").await;
/// assert_eq!(value, Some("Teapot".to_string()));
/// # }
/// ```
#[derive(Clone)]
pub struct LocalCache {
	store: Arc<Mutex<LruCache<String, CacheEntry>>>,
	default_ttl: Option<Duration>,
	hits: Arc<AtomicU64>,
	misses: Arc<AtomicU64>,
	cleanup_handle: Arc<std::sync::Mutex<Option<AbortHandle>>>,
}

impl LocalCache {
	/// Create a cache with the default capacity (1000 entries)
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CAPACITY)
	}

	/// Create a cache bounded to `capacity` entries
	///
	/// A zero capacity is treated as capacity 1.
	pub fn with_capacity(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
		Self {
			store: Arc::new(Mutex::new(LruCache::new(capacity))),
			default_ttl: None,
			hits: Arc::new(AtomicU64::new(0)),
			misses: Arc::new(AtomicU64::new(0)),
			cleanup_handle: Arc::new(std::sync::Mutex::new(None)),
		}
	}

	/// Set a default TTL applied when `set` receives no explicit TTL
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = Some(ttl);
		self
	}

	/// Get a value, recording a hit or miss.
	///
	/// Expired entries are removed on access and count as misses. A stored
	/// payload that no longer deserializes into `T` also counts as a miss
	/// rather than an error.
	pub async fn get<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		let mut store = self.store.lock().await;

		// Decode while the entry borrow is live, drop the dead entry after
		let lookup: Option<Option<T>> = store.get(key).map(|entry| {
			if entry.is_expired() {
				return None;
			}
			match serde_json::from_slice(&entry.value) {
				Ok(value) => Some(value),
				Err(e) => {
					tracing::debug!(key, error = %e, "stored value failed to deserialize, treating as miss");
					None
				}
			}
		});

		match lookup {
			Some(Some(value)) => {
				self.hits.fetch_add(1, Ordering::Relaxed);
				Some(value)
			}
			Some(None) => {
				store.pop(key);
				self.misses.fetch_add(1, Ordering::Relaxed);
				None
			}
			None => {
				self.misses.fetch_add(1, Ordering::Relaxed);
				None
			}
		}
	}

	/// Store a value, evicting the least-recently-used entry if the cache
	/// is at capacity
	pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
	where
		T: Serialize,
	{
		let serialized =
			serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
		let entry = CacheEntry::new(serialized, ttl.or(self.default_ttl));

		let mut store = self.store.lock().await;
		store.put(key.to_string(), entry);
		Ok(())
	}

	/// Remove a single key
	pub async fn delete(&self, key: &str) {
		let mut store = self.store.lock().await;
		store.pop(key);
	}

	/// Remove every entry
	pub async fn clear(&self) {
		let mut store = self.store.lock().await;
		store.clear();
	}

	/// Remove every key matching `pattern`, returning how many were removed.
	///
	/// This walks all keys, which is acceptable because the cache is bounded
	/// and per-process.
	pub async fn invalidate_pattern(&self, pattern: &Regex) -> usize {
		let mut store = self.store.lock().await;
		let matching: Vec<String> = store
			.iter()
			.filter(|(key, _)| pattern.is_match(key))
			.map(|(key, _)| key.clone())
			.collect();
		for key in &matching {
			store.pop(key);
		}
		matching.len()
	}

	/// Check whether a key is present and unexpired, without touching recency
	pub async fn has_key(&self, key: &str) -> bool {
		let store = self.store.lock().await;
		store.peek(key).map(|e| !e.is_expired()).unwrap_or(false)
	}

	/// Current cache statistics
	pub async fn stats(&self) -> LocalCacheStats {
		let store = self.store.lock().await;
		LocalCacheStats {
			size: store.len(),
			capacity: store.cap().get(),
			default_ttl: self.default_ttl,
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
		}
	}

	/// Drop expired entries eagerly instead of waiting for access
	pub async fn cleanup_expired(&self) {
		let mut store = self.store.lock().await;
		let expired: Vec<String> = store
			.iter()
			.filter(|(_, entry)| entry.is_expired())
			.map(|(key, _)| key.clone())
			.collect();
		for key in expired {
			store.pop(&key);
		}
	}

	/// Start a background task that purges expired entries at `interval`.
	///
	/// Restarting replaces any previously running cleanup task.
	pub fn start_auto_cleanup(&self, interval: Duration) {
		let mut handle_guard = self
			.cleanup_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());

		if let Some(existing) = handle_guard.take() {
			existing.abort();
		}

		let cache = self.clone();
		let abort_handle = tokio::spawn(async move {
			let mut interval_timer = tokio::time::interval(interval);
			loop {
				interval_timer.tick().await;
				cache.cleanup_expired().await;
			}
		})
		.abort_handle();

		*handle_guard = Some(abort_handle);
	}

	/// Stop the background cleanup task if one is running
	pub fn stop_auto_cleanup(&self) {
		let mut handle_guard = self
			.cleanup_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(handle) = handle_guard.take() {
			handle.abort();
		}
	}
}

impl Default for LocalCache {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_set_get_delete() {
		let cache = LocalCache::new();

		cache.set("key1", &"value1", None).await.unwrap();
		let value: Option<String> = cache.get("key1").await;
		assert_eq!(value, Some("value1".to_string()));

		assert!(cache.has_key("key1").await);
		assert!(!cache.has_key("key2").await);

		cache.delete("key1").await;
		let value: Option<String> = cache.get("key1").await;
		assert_eq!(value, None);
	}

	#[tokio::test]
	async fn test_lru_eviction_at_capacity() {
		let cache = LocalCache::with_capacity(3);

		cache.set("a", &1, None).await.unwrap();
		cache.set("b", &2, None).await.unwrap();
		cache.set("c", &3, None).await.unwrap();

		// Access "a" so "b" is now the least recently used
		let _: Option<i32> = cache.get("a").await;

		cache.set("d", &4, None).await.unwrap();

		assert_eq!(cache.get::<i32>("a").await, Some(1));
		assert_eq!(cache.get::<i32>("b").await, None);
		assert_eq!(cache.get::<i32>("c").await, Some(3));
		assert_eq!(cache.get::<i32>("d").await, Some(4));

		let stats = cache.stats().await;
		assert_eq!(stats.size, 3);
	}

	#[tokio::test]
	async fn test_insert_n_plus_one_evicts_oldest() {
		let cache = LocalCache::with_capacity(2);

		cache.set("first", &"1", None).await.unwrap();
		cache.set("second", &"2", None).await.unwrap();
		cache.set("third", &"3", None).await.unwrap();

		assert_eq!(cache.get::<String>("first").await, None);
		assert_eq!(cache.get::<String>("second").await, Some("2".to_string()));
		assert_eq!(cache.get::<String>("third").await, Some("3".to_string()));
	}

	#[tokio::test]
	async fn test_ttl_expiry() {
		let cache = LocalCache::new();

		cache
			.set("key1", &"value1", Some(Duration::from_millis(100)))
			.await
			.unwrap();

		let value: Option<String> = cache.get("key1").await;
		assert_eq!(value, Some("value1".to_string()));

		tokio::time::sleep(Duration::from_millis(150)).await;

		let value: Option<String> = cache.get("key1").await;
		assert_eq!(value, None);
	}

	#[tokio::test]
	async fn test_default_ttl_applied() {
		let cache = LocalCache::new().with_default_ttl(Duration::from_millis(50));

		cache.set("key1", &"value1", None).await.unwrap();
		tokio::time::sleep(Duration::from_millis(80)).await;

		assert_eq!(cache.get::<String>("key1").await, None);
	}

	#[tokio::test]
	async fn test_access_does_not_extend_ttl() {
		let cache = LocalCache::new();

		cache
			.set("key1", &"value1", Some(Duration::from_millis(100)))
			.await
			.unwrap();

		// Repeated access must not keep the entry alive past its TTL
		for _ in 0..3 {
			tokio::time::sleep(Duration::from_millis(20)).await;
			let _: Option<String> = cache.get("key1").await;
		}
		tokio::time::sleep(Duration::from_millis(60)).await;

		assert_eq!(cache.get::<String>("key1").await, None);
	}

	#[tokio::test]
	async fn test_invalidate_pattern() {
		let cache = LocalCache::new();

		cache.set("products:v1:all", &"a", None).await.unwrap();
		cache.set("products:v1:toys", &"b", None).await.unwrap();
		cache.set("products:v2:all", &"c", None).await.unwrap();
		cache.set("vendor:v1", &"d", None).await.unwrap();

		let pattern = Regex::new(r"^products:v1:").unwrap();
		let removed = cache.invalidate_pattern(&pattern).await;
		assert_eq!(removed, 2);

		assert!(!cache.has_key("products:v1:all").await);
		assert!(!cache.has_key("products:v1:toys").await);
		assert!(cache.has_key("products:v2:all").await);
		assert!(cache.has_key("vendor:v1").await);
	}

	#[tokio::test]
	async fn test_hit_miss_statistics() {
		let cache = LocalCache::new();

		cache.set("key1", &"value1", None).await.unwrap();

		let _: Option<String> = cache.get("key1").await; // hit
		let _: Option<String> = cache.get("key1").await; // hit
		let _: Option<String> = cache.get("missing").await; // miss

		let stats = cache.stats().await;
		assert_eq!(stats.hits, 2);
		assert_eq!(stats.misses, 1);
		assert_eq!(stats.hit_rate(), 2.0 / 3.0);
	}

	#[tokio::test]
	async fn test_expired_counts_as_miss() {
		let cache = LocalCache::new();

		cache
			.set("key1", &"value1", Some(Duration::from_millis(10)))
			.await
			.unwrap();
		tokio::time::sleep(Duration::from_millis(20)).await;

		let _: Option<String> = cache.get("key1").await;

		let stats = cache.stats().await;
		assert_eq!(stats.hits, 0);
		assert_eq!(stats.misses, 1);
	}

	#[tokio::test]
	async fn test_cleanup_expired() {
		let cache = LocalCache::new();

		cache
			.set("short", &"v", Some(Duration::from_millis(30)))
			.await
			.unwrap();
		cache.set("long", &"v", None).await.unwrap();

		tokio::time::sleep(Duration::from_millis(50)).await;
		cache.cleanup_expired().await;

		let stats = cache.stats().await;
		assert_eq!(stats.size, 1);
		assert!(cache.has_key("long").await);
	}

	#[tokio::test]
	async fn test_auto_cleanup_task() {
		let cache = LocalCache::new();
		cache.start_auto_cleanup(Duration::from_millis(25));

		cache
			.set("key1", &"value1", Some(Duration::from_millis(40)))
			.await
			.unwrap();

		tokio::time::sleep(Duration::from_millis(100)).await;

		let stats = cache.stats().await;
		assert_eq!(stats.size, 0);
		cache.stop_auto_cleanup();
	}

	#[tokio::test]
	async fn test_clear() {
		let cache = LocalCache::new();

		cache.set("key1", &"v1", None).await.unwrap();
		cache.set("key2", &"v2", None).await.unwrap();
		cache.clear().await;

		let stats = cache.stats().await;
		assert_eq!(stats.size, 0);
	}
}
