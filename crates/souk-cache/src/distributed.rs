//! Distributed cache with transparent local fallback
//!
//! Wraps a [`RemoteStore`] and degrades to a bounded in-process cache when
//! the remote store is unreachable. A remote outage therefore reduces cache
//! scope to the current process instead of failing the caller.

use crate::error::{CacheError, Result};
use crate::keys::glob_to_regex;
use crate::local::LocalCache;
use crate::remote::RemoteStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const FALLBACK_CAPACITY: usize = 1000;
const FALLBACK_TTL: Duration = Duration::from_secs(300);

/// Remote-backed cache with per-process fallback.
///
/// All logical keys are namespaced as `{app}:{env}:{key}` before touching
/// the remote store, so deployments sharing one Redis instance cannot
/// collide. The fallback tier is keyed by the logical key.
///
/// # Examples
///
/// ```
/// use souk_cache::{DistributedCache, InMemoryRemoteStore};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let store = Arc::new(InMemoryRemoteStore::new());
/// let cache = DistributedCache::new(store, "souk", "test");
///
/// cache.set("product:1", &"Teapot", 60).await;
/// let value: Option<String> = cache.get("product:1").await;
/// assert_eq!(value, Some("Teapot".to_string()));
/// # }
/// ```
#[derive(Clone)]
pub struct DistributedCache {
	store: Arc<dyn RemoteStore>,
	fallback: LocalCache,
	key_prefix: String,
}

impl DistributedCache {
	/// Create a cache over `store`, namespaced by application name and
	/// environment
	pub fn new(store: Arc<dyn RemoteStore>, app_name: &str, env: &str) -> Self {
		Self {
			store,
			fallback: LocalCache::with_capacity(FALLBACK_CAPACITY).with_default_ttl(FALLBACK_TTL),
			key_prefix: format!("{app_name}:{env}"),
		}
	}

	/// Replace the default fallback tier (1000 entries, 5 minute TTL)
	pub fn with_fallback(mut self, fallback: LocalCache) -> Self {
		self.fallback = fallback;
		self
	}

	fn namespaced(&self, key: &str) -> String {
		format!("{}:{}", self.key_prefix, key)
	}

	/// Get a value.
	///
	/// Remote errors fall through to the fallback tier; a payload that no
	/// longer deserializes is a miss, never an error.
	pub async fn get<T>(&self, key: &str) -> Option<T>
	where
		T: DeserializeOwned,
	{
		match self.store.get(&self.namespaced(key)).await {
			Ok(Some(raw)) => match serde_json::from_str(&raw) {
				Ok(value) => Some(value),
				Err(e) => {
					tracing::debug!(key, error = %e, "remote value failed to deserialize, treating as miss");
					None
				}
			},
			Ok(None) => None,
			Err(e) => {
				tracing::warn!(key, error = %e, "remote get failed, serving from local fallback");
				self.fallback.get(key).await
			}
		}
	}

	/// Store a value with a TTL in seconds.
	///
	/// The fallback tier is always populated so a subsequent remote outage
	/// still serves this write. Returns whether the remote write succeeded.
	pub async fn set<T>(&self, key: &str, value: &T, ttl_secs: u64) -> bool
	where
		T: Serialize,
	{
		let raw = match serde_json::to_string(value) {
			Ok(raw) => raw,
			Err(e) => {
				tracing::warn!(key, error = %e, "value failed to serialize, skipping cache write");
				return false;
			}
		};

		if let Err(e) = self
			.fallback
			.set(key, value, Some(Duration::from_secs(ttl_secs)))
			.await
		{
			tracing::debug!(key, error = %e, "fallback write failed");
		}

		match self.store.set_ex(&self.namespaced(key), &raw, ttl_secs).await {
			Ok(()) => true,
			Err(e) => {
				tracing::warn!(key, error = %e, "remote set failed, write retained in local fallback");
				false
			}
		}
	}

	/// Delete a key from both tiers. Returns whether the remote delete
	/// succeeded.
	pub async fn delete(&self, key: &str) -> bool {
		self.fallback.delete(key).await;
		match self.store.del(&[self.namespaced(key)]).await {
			Ok(_) => true,
			Err(e) => {
				tracing::warn!(key, error = %e, "remote delete failed");
				false
			}
		}
	}

	/// Delete every key matching a glob pattern, returning how many remote
	/// keys were removed (fallback removals when the remote is down)
	pub async fn delete_pattern(&self, pattern: &str) -> usize {
		let fallback_removed = match glob_to_regex(pattern) {
			Some(re) => self.fallback.invalidate_pattern(&re).await,
			None => 0,
		};

		let namespaced_pattern = self.namespaced(pattern);
		match self.store.keys(&namespaced_pattern).await {
			Ok(keys) if keys.is_empty() => 0,
			Ok(keys) => match self.store.del(&keys).await {
				Ok(count) => count as usize,
				Err(e) => {
					tracing::warn!(pattern, error = %e, "remote pattern delete failed");
					fallback_removed
				}
			},
			Err(e) => {
				tracing::warn!(pattern, error = %e, "remote key scan failed");
				fallback_removed
			}
		}
	}

	/// Check key existence, consulting the fallback when the remote errors
	pub async fn has(&self, key: &str) -> bool {
		match self.store.exists(&self.namespaced(key)).await {
			Ok(exists) => exists,
			Err(e) => {
				tracing::warn!(key, error = %e, "remote exists failed, checking local fallback");
				self.fallback.has_key(key).await
			}
		}
	}

	/// Clear this cache's namespace from the remote store and empty the
	/// fallback tier. Returns whether the remote clear succeeded.
	pub async fn clear(&self) -> bool {
		self.fallback.clear().await;

		let pattern = format!("{}:*", self.key_prefix);
		match self.store.keys(&pattern).await {
			Ok(keys) if keys.is_empty() => true,
			Ok(keys) => match self.store.del(&keys).await {
				Ok(_) => true,
				Err(e) => {
					tracing::warn!(error = %e, "remote clear failed");
					false
				}
			},
			Err(e) => {
				tracing::warn!(error = %e, "remote clear failed");
				false
			}
		}
	}

	/// Cache-aside read: return the cached value, or fetch from the source
	/// of truth and populate the cache without making the caller wait.
	///
	/// The fresh value is returned immediately; persisting it to the cache
	/// runs as a spawned task whose failures are logged, never propagated.
	/// Errors from `fetch` itself do propagate.
	pub async fn wrap<T, F, Fut>(&self, key: &str, ttl_secs: u64, fetch: F) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		if let Some(cached) = self.get(key).await {
			return Ok(cached);
		}

		let value = fetch().await?;

		match serde_json::to_string(&value) {
			Ok(raw) => {
				let cache = self.clone();
				let key = key.to_string();
				tokio::spawn(async move {
					if let Err(e) = cache.set_raw(&key, &raw, ttl_secs).await {
						tracing::warn!(key, error = %e, "background cache population failed");
					}
				});
			}
			Err(e) => {
				tracing::warn!(key, error = %e, "fetched value failed to serialize, not cached");
			}
		}

		Ok(value)
	}

	/// Probe remote store health
	pub async fn ping(&self) -> bool {
		self.store.ping().await.is_ok()
	}

	/// Statistics of the fallback tier
	pub async fn fallback_stats(&self) -> crate::local::LocalCacheStats {
		self.fallback.stats().await
	}

	async fn set_raw(&self, key: &str, raw: &str, ttl_secs: u64) -> Result<()> {
		// Fallback stores the same serialized payload
		let parsed: serde_json::Value = serde_json::from_str(raw)
			.map_err(|e| CacheError::Serialization(e.to_string()))?;
		if let Err(e) = self
			.fallback
			.set(key, &parsed, Some(Duration::from_secs(ttl_secs)))
			.await
		{
			tracing::debug!(key, error = %e, "fallback write failed");
		}
		self.store
			.set_ex(&self.namespaced(key), raw, ttl_secs)
			.await
			.map_err(|e| CacheError::Serialization(e.to_string()))?;
		Ok(())
	}
}
