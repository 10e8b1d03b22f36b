//! Job kinds and their handlers.
//!
//! Every background job the platform runs is a [`JobKind`] variant, so
//! dispatch is a closed match rather than a name lookup: an unhandled
//! kind is a compile error, not a runtime failure, and payload shapes
//! are checked at enqueue time.

use crate::error::{TaskError, TaskResult};
use serde::{Deserialize, Serialize};
use souk_cache::{DistributedCache, keys};
use std::sync::Arc;

/// Which cache namespace a [`JobKind::CleanupCache`] job targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheTarget {
	All,
	Products,
	Vendors,
	Inventory,
}

/// The closed set of background jobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
	SendEmail {
		to: String,
		subject: String,
		html: String,
	},
	ProcessImage {
		image_url: String,
		sizes: Vec<u32>,
	},
	GenerateReport {
		vendor_id: String,
		report_type: String,
		period: String,
	},
	SyncInventory {
		vendor_id: String,
	},
	CleanupCache {
		target: CacheTarget,
	},
	SendNotification {
		user_id: String,
		title: String,
		body: String,
	},
}

impl JobKind {
	/// Short name used in logs and queue stats
	pub fn name(&self) -> &'static str {
		match self {
			Self::SendEmail { .. } => "send_email",
			Self::ProcessImage { .. } => "process_image",
			Self::GenerateReport { .. } => "generate_report",
			Self::SyncInventory { .. } => "sync_inventory",
			Self::CleanupCache { .. } => "cleanup_cache",
			Self::SendNotification { .. } => "send_notification",
		}
	}
}

/// Shared resources handed to every job handler
#[derive(Clone, Default)]
pub struct JobContext {
	cache: Option<Arc<DistributedCache>>,
}

impl JobContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Attaches the cache that cache-touching handlers operate on
	pub fn with_cache(cache: Arc<DistributedCache>) -> Self {
		Self { cache: Some(cache) }
	}

	pub fn cache(&self) -> Option<&Arc<DistributedCache>> {
		self.cache.as_ref()
	}

	fn require_cache(&self) -> TaskResult<&Arc<DistributedCache>> {
		self.cache
			.as_ref()
			.ok_or_else(|| TaskError::handler("no cache attached to job context"))
	}
}

/// Runs the handler for one job kind
pub async fn execute(kind: &JobKind, ctx: &JobContext) -> TaskResult<()> {
	match kind {
		JobKind::SendEmail { to, subject, html } => send_email(to, subject, html).await,
		JobKind::ProcessImage { image_url, sizes } => process_image(image_url, sizes).await,
		JobKind::GenerateReport {
			vendor_id,
			report_type,
			period,
		} => generate_report(ctx, vendor_id, report_type, period).await,
		JobKind::SyncInventory { vendor_id } => sync_inventory(ctx, vendor_id).await,
		JobKind::CleanupCache { target } => cleanup_cache(ctx, *target).await,
		JobKind::SendNotification {
			user_id,
			title,
			body,
		} => send_notification(user_id, title, body).await,
	}
}

async fn send_email(to: &str, subject: &str, _html: &str) -> TaskResult<()> {
	if to.is_empty() || !to.contains('@') {
		return Err(TaskError::handler(format!(
			"invalid recipient address: {to:?}"
		)));
	}
	tracing::info!(to, subject, "dispatched email");
	Ok(())
}

async fn process_image(image_url: &str, sizes: &[u32]) -> TaskResult<()> {
	if image_url.is_empty() {
		return Err(TaskError::handler("image url is empty"));
	}
	if sizes.is_empty() {
		return Err(TaskError::handler("no target sizes given"));
	}
	for size in sizes {
		tracing::debug!(image_url, size, "generated thumbnail");
	}
	tracing::info!(image_url, count = sizes.len(), "processed image");
	Ok(())
}

async fn generate_report(
	ctx: &JobContext,
	vendor_id: &str,
	report_type: &str,
	period: &str,
) -> TaskResult<()> {
	if vendor_id.is_empty() {
		return Err(TaskError::handler("vendor id is empty"));
	}
	let cache = ctx.require_cache()?;

	let report = serde_json::json!({
		"vendor_id": vendor_id,
		"report_type": report_type,
		"period": period,
		"generated_at": chrono::Utc::now().to_rfc3339(),
	});
	let key = keys::analytics_dashboard(vendor_id, period);
	cache.set(&key, &report, 3600).await;
	tracing::info!(vendor_id, report_type, period, "generated report");
	Ok(())
}

async fn sync_inventory(ctx: &JobContext, vendor_id: &str) -> TaskResult<()> {
	if vendor_id.is_empty() {
		return Err(TaskError::handler("vendor id is empty"));
	}
	let cache = ctx.require_cache()?;

	// Stale vendor listings must not survive a sync
	let dropped = cache
		.delete_pattern(&keys::vendor_products_pattern(vendor_id))
		.await;
	tracing::info!(vendor_id, dropped, "synced vendor inventory");
	Ok(())
}

async fn cleanup_cache(ctx: &JobContext, target: CacheTarget) -> TaskResult<()> {
	let cache = ctx.require_cache()?;

	let dropped = match target {
		CacheTarget::All => {
			cache.clear().await;
			0
		}
		CacheTarget::Products => cache.delete_pattern(keys::all_products_pattern()).await,
		CacheTarget::Vendors => cache.delete_pattern(keys::all_vendors_pattern()).await,
		CacheTarget::Inventory => cache.delete_pattern(keys::all_inventory_pattern()).await,
	};
	tracing::info!(?target, dropped, "cleaned cache");
	Ok(())
}

async fn send_notification(user_id: &str, title: &str, _body: &str) -> TaskResult<()> {
	if user_id.is_empty() {
		return Err(TaskError::handler("user id is empty"));
	}
	tracing::info!(user_id, title, "sent notification");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use souk_cache::InMemoryRemoteStore;

	fn cache_context() -> (JobContext, Arc<DistributedCache>) {
		let store = Arc::new(InMemoryRemoteStore::new());
		let cache = Arc::new(DistributedCache::new(store, "souk", "test"));
		(JobContext::with_cache(cache.clone()), cache)
	}

	#[tokio::test]
	async fn test_send_email_rejects_bad_recipient() {
		let ctx = JobContext::new();
		let kind = JobKind::SendEmail {
			to: "not-an-address".to_string(),
			subject: "hi".to_string(),
			html: "<p>hi</p>".to_string(),
		};
		assert!(execute(&kind, &ctx).await.is_err());
	}

	#[tokio::test]
	async fn test_send_email_accepts_valid_recipient() {
		let ctx = JobContext::new();
		let kind = JobKind::SendEmail {
			to: "buyer@example.com".to_string(),
			subject: "Your order shipped".to_string(),
			html: "<p>on its way</p>".to_string(),
		};
		assert!(execute(&kind, &ctx).await.is_ok());
	}

	#[tokio::test]
	async fn test_process_image_requires_sizes() {
		let ctx = JobContext::new();
		let kind = JobKind::ProcessImage {
			image_url: "https://cdn.example.com/p/1.jpg".to_string(),
			sizes: vec![],
		};
		assert!(execute(&kind, &ctx).await.is_err());
	}

	#[tokio::test]
	async fn test_generate_report_populates_cache() {
		let (ctx, cache) = cache_context();
		let kind = JobKind::GenerateReport {
			vendor_id: "v-1".to_string(),
			report_type: "sales".to_string(),
			period: "2026-08".to_string(),
		};
		execute(&kind, &ctx).await.unwrap();

		let cached: Option<serde_json::Value> =
			cache.get(&keys::analytics_dashboard("v-1", "2026-08")).await;
		assert_eq!(cached.unwrap()["vendor_id"], "v-1");
	}

	#[tokio::test]
	async fn test_sync_inventory_invalidates_vendor_listings() {
		let (ctx, cache) = cache_context();
		cache
			.set(&keys::vendor_products("v-1", None), &"listing", 300)
			.await;
		cache
			.set(&keys::vendor_products("v-2", None), &"listing", 300)
			.await;

		execute(
			&JobKind::SyncInventory {
				vendor_id: "v-1".to_string(),
			},
			&ctx,
		)
		.await
		.unwrap();

		assert!(!cache.has(&keys::vendor_products("v-1", None)).await);
		assert!(cache.has(&keys::vendor_products("v-2", None)).await);
	}

	#[tokio::test]
	async fn test_cleanup_cache_targets_one_namespace() {
		let (ctx, cache) = cache_context();
		cache.set(&keys::product("p-1"), &"product", 300).await;
		cache.set(&keys::vendor("v-1"), &"vendor", 300).await;

		execute(
			&JobKind::CleanupCache {
				target: CacheTarget::Products,
			},
			&ctx,
		)
		.await
		.unwrap();

		assert!(!cache.has(&keys::product("p-1")).await);
		assert!(cache.has(&keys::vendor("v-1")).await);
	}

	#[tokio::test]
	async fn test_cache_jobs_require_a_cache() {
		let ctx = JobContext::new();
		let result = execute(
			&JobKind::CleanupCache {
				target: CacheTarget::All,
			},
			&ctx,
		)
		.await;
		assert!(result.is_err());
	}

	#[test]
	fn test_kind_serializes_with_type_tag() {
		let kind = JobKind::SyncInventory {
			vendor_id: "v-1".to_string(),
		};
		let json = serde_json::to_value(&kind).unwrap();
		assert_eq!(json["type"], "sync_inventory");
		assert_eq!(json["vendor_id"], "v-1");
	}
}
