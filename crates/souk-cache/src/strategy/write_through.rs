//! Write-through strategy

use crate::distributed::DistributedCache;
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;

/// Write path that updates the source of truth and the cache together.
///
/// The authoritative update runs first; only on success is the result
/// mirrored into the distributed cache, before control returns to the
/// caller. The cache is therefore never stale with respect to committed
/// updates, at the cost of adding the cache-write latency to every
/// mutation. When the update fails, no cache write happens and the error
/// propagates unchanged.
///
/// # Examples
///
/// ```
/// use souk_cache::{DistributedCache, InMemoryRemoteStore, WriteThrough};
/// use std::sync::Arc;
///
/// # async fn example() -> souk_cache::Result<()> {
/// let cache = DistributedCache::new(Arc::new(InMemoryRemoteStore::new()), "souk", "test");
/// let strategy = WriteThrough::new(cache);
///
/// let updated = strategy
///     .set("product:1", 300, || async {
///         // run the authoritative write and return the new state
///         Ok("Teapot v2".to_string())
///     })
///     .await?;
/// assert_eq!(updated, "Teapot v2");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WriteThrough {
	cache: DistributedCache,
}

impl WriteThrough {
	pub fn new(cache: DistributedCache) -> Self {
		Self { cache }
	}

	/// Run the authoritative update, then mirror its result into the cache
	/// before returning
	pub async fn set<T, F, Fut>(&self, key: &str, ttl_secs: u64, update: F) -> Result<T>
	where
		T: Serialize + DeserializeOwned,
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let value = update().await?;
		self.cache.set(key, &value, ttl_secs).await;
		Ok(value)
	}
}
