//! Shared infrastructure context.
//!
//! One [`InfraContext`] is built at application startup and handed to
//! request handlers explicitly. There are no process-wide singletons:
//! tests build as many isolated contexts as they need, each with its own
//! cache, limiter, and queue.

use crate::settings::InfraSettings;
use souk_cache::{DistributedCache, InMemoryRemoteStore, LocalCache, RemoteStore};
use souk_tasks::{JobContext, JobQueue, QueueConfig};
use souk_throttling::{CounterBackend, MemoryCounterBackend, RateLimitConfig, RateLimiter};
use std::sync::Arc;

/// Handle to every infrastructure service the API depends on.
///
/// Construction is fail-open: if Redis is configured but unreachable,
/// the cache and limiter come up on their in-process backends and the
/// application still serves traffic.
///
/// # Examples
///
/// ```
/// use souk::{InfraContext, InfraSettings};
///
/// # tokio_test::block_on(async {
/// let infra = InfraContext::init(InfraSettings::default()).await;
///
/// infra.cache().set("greeting", &"hello", 60).await;
/// let cached: Option<String> = infra.cache().get("greeting").await;
/// assert_eq!(cached.as_deref(), Some("hello"));
///
/// infra.shutdown().await;
/// # });
/// ```
pub struct InfraContext {
	settings: InfraSettings,
	cache: Arc<DistributedCache>,
	limiter: Arc<RateLimiter>,
	queue: Arc<JobQueue>,
}

impl InfraContext {
	/// Brings up the cache, rate limiter, and job queue, starting their
	/// background workers
	pub async fn init(settings: InfraSettings) -> Self {
		let fallback = LocalCache::with_capacity(settings.local_cache_capacity)
			.with_default_ttl(settings.local_cache_ttl);
		let cache = Arc::new(
			DistributedCache::new(
				remote_store(&settings).await,
				&settings.app_name,
				&settings.environment,
			)
			.with_fallback(fallback),
		);

		let limiter = Arc::new(RateLimiter::new(counter_backend(&settings)));
		limiter.start_sweeper_with_interval(settings.rate_limit_sweep_interval);

		let queue_config = QueueConfig {
			handler_timeout: settings.job_timeout,
			..QueueConfig::default()
		};
		let queue = Arc::new(JobQueue::with_config(
			JobContext::with_cache(Arc::clone(&cache)),
			queue_config,
		));
		queue.start();

		tracing::info!(
			app = %settings.app_name,
			env = %settings.environment,
			redis = settings.redis_url.is_some(),
			"infrastructure context initialized"
		);

		Self {
			settings,
			cache,
			limiter,
			queue,
		}
	}

	pub fn cache(&self) -> &Arc<DistributedCache> {
		&self.cache
	}

	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	pub fn jobs(&self) -> &Arc<JobQueue> {
		&self.queue
	}

	/// Rate-limit parameters from settings, for the common per-client check
	pub fn rate_limit_config(&self) -> RateLimitConfig {
		RateLimitConfig::new(
			self.settings.rate_limit_max_requests,
			self.settings.rate_limit_window,
		)
	}

	pub fn settings(&self) -> &InfraSettings {
		&self.settings
	}

	/// Stops background workers. The queue rejects enqueues afterwards.
	pub async fn shutdown(&self) {
		self.queue.shutdown().await;
		self.limiter.stop_sweeper();
		tracing::info!("infrastructure context shut down");
	}
}

async fn remote_store(settings: &InfraSettings) -> Arc<dyn RemoteStore> {
	#[cfg(feature = "redis-backend")]
	if let Some(url) = &settings.redis_url {
		match souk_cache::RedisStore::connect(url).await {
			Ok(store) => return Arc::new(store),
			Err(e) => {
				tracing::warn!(error = %e, "redis unreachable, cache running in process");
			}
		}
	}
	#[cfg(not(feature = "redis-backend"))]
	if settings.redis_url.is_some() {
		tracing::warn!("redis url configured but the redis-backend feature is disabled");
	}
	Arc::new(InMemoryRemoteStore::new())
}

fn counter_backend(settings: &InfraSettings) -> Arc<dyn CounterBackend> {
	#[cfg(feature = "redis-backend")]
	if let Some(url) = &settings.redis_url {
		match souk_throttling::RedisCounterBackend::new(url) {
			Ok(backend) => return Arc::new(backend),
			Err(e) => {
				tracing::warn!(error = %e, "redis unreachable, rate limiting in process");
			}
		}
	}
	let _ = settings;
	Arc::new(MemoryCounterBackend::new())
}

#[cfg(test)]
mod tests {
	use super::*;
	use souk_tasks::{JobKind, JobStatus};
	use std::time::Duration;

	fn test_settings() -> InfraSettings {
		InfraSettings::default().with_environment("test")
	}

	#[tokio::test]
	async fn test_contexts_are_isolated() {
		let a = InfraContext::init(test_settings()).await;
		let b = InfraContext::init(test_settings()).await;

		a.cache().set("k", &1u32, 60).await;
		let from_b: Option<u32> = b.cache().get("k").await;
		assert!(from_b.is_none());

		a.shutdown().await;
		b.shutdown().await;
	}

	#[tokio::test]
	async fn test_limiter_uses_settings() {
		let settings = InfraSettings {
			rate_limit_max_requests: 2,
			rate_limit_window: Duration::from_secs(60),
			..test_settings()
		};
		let infra = InfraContext::init(settings).await;
		let config = infra.rate_limit_config();

		assert!(infra.limiter().check("client", &config).await);
		assert!(infra.limiter().check("client", &config).await);
		assert!(!infra.limiter().check("client", &config).await);

		infra.shutdown().await;
	}

	#[tokio::test]
	async fn test_queue_runs_jobs_against_the_shared_cache() {
		let infra = InfraContext::init(test_settings()).await;

		let id = infra
			.jobs()
			.enqueue(JobKind::GenerateReport {
				vendor_id: "v-1".to_string(),
				report_type: "sales".to_string(),
				period: "2026-08".to_string(),
			})
			.await
			.unwrap();

		for _ in 0..200 {
			if infra.jobs().job_status(id).await == Some(JobStatus::Completed) {
				break;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		assert_eq!(infra.jobs().job_status(id).await, Some(JobStatus::Completed));

		let cached: Option<serde_json::Value> = infra
			.cache()
			.get(&souk_cache::keys::analytics_dashboard("v-1", "2026-08"))
			.await;
		assert!(cached.is_some());

		infra.shutdown().await;
	}

	#[tokio::test]
	async fn test_shutdown_closes_the_queue() {
		let infra = InfraContext::init(test_settings()).await;
		infra.shutdown().await;
		assert!(
			infra
				.jobs()
				.enqueue(JobKind::SyncInventory {
					vendor_id: "v-1".to_string(),
				})
				.await
				.is_err()
		);
	}
}
