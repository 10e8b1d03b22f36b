//! Predictive pre-fetch helpers

use crate::distributed::DistributedCache;
use crate::error::Result;
use crate::keys;
use serde::Serialize;
use std::future::Future;

/// Fire-and-forget warming of keys likely to be read next.
///
/// When a product is read, its same-category siblings and the next
/// pagination page are probable follow-up reads. Each candidate is checked
/// with a cheap existence probe first so already-warm keys cost nothing.
/// Prefetching never blocks the triggering request and never surfaces its
/// own errors; failures are logged and dropped.
#[derive(Clone)]
pub struct PrefetchEngine {
	cache: DistributedCache,
}

impl PrefetchEngine {
	pub fn new(cache: DistributedCache) -> Self {
		Self { cache }
	}

	/// Warm an arbitrary set of keys in the background.
	///
	/// `fetch_for` resolves one key to its value; returning `Ok(None)`
	/// skips the key (e.g. the sibling no longer exists).
	pub fn prefetch<T, F, Fut>(&self, candidate_keys: Vec<String>, ttl_secs: u64, fetch_for: F)
	where
		T: Serialize + Send + Sync + 'static,
		F: Fn(String) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Option<T>>> + Send + 'static,
	{
		let cache = self.cache.clone();
		tokio::spawn(async move {
			for key in candidate_keys {
				if cache.has(&key).await {
					continue;
				}
				match fetch_for(key.clone()).await {
					Ok(Some(value)) => {
						cache.set(&key, &value, ttl_secs).await;
					}
					Ok(None) => {}
					Err(e) => {
						tracing::warn!(key = %key, error = %e, "prefetch fetch failed");
					}
				}
			}
		});
	}

	/// Warm sibling products of the one just read
	pub fn prefetch_sibling_products<T, F, Fut>(
		&self,
		sibling_ids: Vec<String>,
		ttl_secs: u64,
		fetch_product: F,
	) where
		T: Serialize + Send + Sync + 'static,
		F: Fn(String) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Option<T>>> + Send + 'static,
	{
		let candidates = sibling_ids.iter().map(|id| keys::product(id)).collect();
		self.prefetch(candidates, ttl_secs, move |key| {
			// product:{id} -> {id}
			let id = key.rsplit(':').next().unwrap_or_default().to_string();
			fetch_product(id)
		});
	}

	/// Warm the next page of a vendor's product listing
	pub fn prefetch_next_page<T, F, Fut>(
		&self,
		vendor_id: &str,
		category_id: Option<&str>,
		next_page: u32,
		ttl_secs: u64,
		fetch_page: F,
	) where
		T: Serialize + Send + Sync + 'static,
		F: Fn(u32) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<Option<T>>> + Send + 'static,
	{
		let key = format!(
			"{}:page:{next_page}",
			keys::vendor_products(vendor_id, category_id)
		);
		self.prefetch(vec![key], ttl_secs, move |_| fetch_page(next_page));
	}
}
