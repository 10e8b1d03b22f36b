//! End-to-end tests over the full infrastructure context

use souk::cache::keys;
use souk::tasks::{Job, JobKind, JobStatus};
use souk::{InfraContext, InfraSettings};
use std::time::Duration;

fn test_settings() -> InfraSettings {
	InfraSettings::default().with_environment("integration")
}

async fn wait_for_status(infra: &InfraContext, id: souk::tasks::JobId, status: JobStatus) {
	for _ in 0..200 {
		if infra.jobs().job_status(id).await == Some(status) {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("job {id} never reached {status:?}");
}

#[tokio::test]
async fn invalid_email_job_fails_and_is_inspectable() {
	let infra = InfraContext::init(test_settings()).await;

	let job = Job::new(JobKind::SendEmail {
		to: "not-an-address".to_string(),
		subject: "Welcome".to_string(),
		html: "<p>hi</p>".to_string(),
	})
	.with_max_attempts(1);
	let id = infra.jobs().enqueue_job(job).await.unwrap();

	wait_for_status(&infra, id, JobStatus::Failed).await;

	let failed = infra.jobs().failed_jobs(1).await;
	assert_eq!(failed.len(), 1);
	assert_eq!(failed[0].id, id);
	assert_eq!(failed[0].attempts, 1);
	assert!(failed[0].last_error.as_deref().unwrap().contains("recipient"));

	infra.shutdown().await;
}

#[tokio::test]
async fn report_job_output_is_readable_through_the_cache() {
	let infra = InfraContext::init(test_settings()).await;

	let id = infra
		.jobs()
		.enqueue(JobKind::GenerateReport {
			vendor_id: "v-42".to_string(),
			report_type: "sales".to_string(),
			period: "2026-08".to_string(),
		})
		.await
		.unwrap();
	wait_for_status(&infra, id, JobStatus::Completed).await;

	let report: Option<serde_json::Value> = infra
		.cache()
		.get(&keys::analytics_dashboard("v-42", "2026-08"))
		.await;
	assert_eq!(report.unwrap()["report_type"], "sales");

	infra.shutdown().await;
}

#[tokio::test]
async fn cleanup_job_invalidates_cached_products() {
	let infra = InfraContext::init(test_settings()).await;

	infra.cache().set(&keys::product("p-1"), &"teapot", 300).await;
	infra.cache().set(&keys::vendor("v-1"), &"vendor", 300).await;

	let id = infra
		.jobs()
		.enqueue(JobKind::CleanupCache {
			target: souk::tasks::CacheTarget::Products,
		})
		.await
		.unwrap();
	wait_for_status(&infra, id, JobStatus::Completed).await;

	assert!(!infra.cache().has(&keys::product("p-1")).await);
	assert!(infra.cache().has(&keys::vendor("v-1")).await);

	infra.shutdown().await;
}

#[tokio::test]
async fn rate_limit_denial_carries_retry_information() {
	let settings = InfraSettings {
		rate_limit_max_requests: 3,
		rate_limit_window: Duration::from_secs(60),
		..test_settings()
	};
	let infra = InfraContext::init(settings).await;
	let config = infra.rate_limit_config();

	for _ in 0..3 {
		assert!(infra.limiter().check("203.0.113.9", &config).await);
	}

	let denied = infra.limiter().check_detailed("203.0.113.9", &config).await;
	assert!(!denied.allowed);
	assert_eq!(denied.limit, 3);
	assert_eq!(denied.remaining, 0);
	assert!(denied.reset_after > Duration::ZERO);
	assert!(denied.reset_after <= Duration::from_secs(60));

	infra.shutdown().await;
}
