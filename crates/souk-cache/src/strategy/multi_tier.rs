//! Multi-tier read-through strategy

use crate::distributed::DistributedCache;
use crate::error::Result;
use crate::keys::glob_to_regex;
use crate::local::LocalCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Read path that probes L1 (in-process), L2 (distributed), then the
/// source of truth, populating every tier it missed on the way up.
///
/// L1 population is synchronous because it is in-process and cheap; L2
/// population is fire-and-forget so the caller never pays remote-write
/// latency on a read. Invalidation clears every tier, including any named
/// specialised caches the application registers (product, vendor,
/// inventory), to avoid tier divergence.
#[derive(Clone)]
pub struct MultiTierCache {
	l1: LocalCache,
	l2: DistributedCache,
	named_tiers: Arc<RwLock<HashMap<String, LocalCache>>>,
}

impl MultiTierCache {
	pub fn new(l1: LocalCache, l2: DistributedCache) -> Self {
		Self {
			l1,
			l2,
			named_tiers: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	/// Register a named specialised local cache so invalidation reaches it
	pub async fn register_tier(&self, name: &str, cache: LocalCache) {
		let mut tiers = self.named_tiers.write().await;
		tiers.insert(name.to_string(), cache);
	}

	/// Read through the tiers, falling back to `fetch` as the source of
	/// truth
	pub async fn get<T, F, Fut>(&self, key: &str, ttl_secs: u64, fetch: F) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		if let Some(value) = self.l1.get(key).await {
			return Ok(value);
		}

		let ttl = Duration::from_secs(ttl_secs);

		if let Some(value) = self.l2.get::<T>(key).await {
			if let Err(e) = self.l1.set(key, &value, Some(ttl)).await {
				tracing::debug!(key, error = %e, "L1 population failed");
			}
			return Ok(value);
		}

		let value = fetch().await?;

		if let Err(e) = self.l1.set(key, &value, Some(ttl)).await {
			tracing::debug!(key, error = %e, "L1 population failed");
		}

		// L2 population must not delay the read
		match serde_json::to_value(&value) {
			Ok(json) => {
				let l2 = self.l2.clone();
				let key = key.to_string();
				tokio::spawn(async move {
					l2.set(&key, &json, ttl_secs).await;
				});
			}
			Err(e) => {
				tracing::warn!(key, error = %e, "fetched value failed to serialize, L2 not populated");
			}
		}

		Ok(value)
	}

	/// Remove a key from every tier
	pub async fn invalidate(&self, key: &str) {
		self.l1.delete(key).await;
		self.l2.delete(key).await;
		let tiers = self.named_tiers.read().await;
		for cache in tiers.values() {
			cache.delete(key).await;
		}
	}

	/// Remove every key matching a glob pattern from every tier, returning
	/// the number of remote keys removed
	pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
		if let Some(re) = glob_to_regex(pattern) {
			self.l1.invalidate_pattern(&re).await;
			let tiers = self.named_tiers.read().await;
			for cache in tiers.values() {
				cache.invalidate_pattern(&re).await;
			}
		}
		self.l2.delete_pattern(pattern).await
	}
}
