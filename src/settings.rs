//! Environment-driven configuration for the infrastructure context

use std::env;
use std::time::Duration;

const ENV_PREFIX: &str = "SOUK_";

/// Settings for [`InfraContext::init`](crate::InfraContext::init).
///
/// Every field has a sensible default, so `InfraSettings::default()` is a
/// working development configuration. [`from_env`](Self::from_env) reads
/// overrides from `SOUK_`-prefixed environment variables.
#[derive(Debug, Clone)]
pub struct InfraSettings {
	/// Application name used in the cache key namespace
	pub app_name: String,
	/// Deployment environment used in the cache key namespace
	pub environment: String,
	/// Redis URL; `None` runs everything in process
	pub redis_url: Option<String>,
	/// Entry cap for the local cache tier
	pub local_cache_capacity: usize,
	/// Default TTL for local cache entries
	pub local_cache_ttl: Duration,
	/// Requests allowed per rate-limit window
	pub rate_limit_max_requests: u64,
	/// Rate-limit window length
	pub rate_limit_window: Duration,
	/// How often expired fallback rate-limit windows are swept
	pub rate_limit_sweep_interval: Duration,
	/// Upper bound on one job handler invocation
	pub job_timeout: Duration,
}

impl Default for InfraSettings {
	fn default() -> Self {
		Self {
			app_name: "souk".to_string(),
			environment: "development".to_string(),
			redis_url: None,
			local_cache_capacity: 1000,
			local_cache_ttl: Duration::from_secs(300),
			rate_limit_max_requests: 100,
			rate_limit_window: Duration::from_secs(60),
			rate_limit_sweep_interval: Duration::from_secs(300),
			job_timeout: Duration::from_secs(30),
		}
	}
}

impl InfraSettings {
	/// Builds settings from `SOUK_`-prefixed environment variables,
	/// falling back to defaults for anything unset or unparseable.
	///
	/// Recognized variables: `SOUK_APP_NAME`, `SOUK_ENV`, `SOUK_REDIS_URL`,
	/// `SOUK_LOCAL_CACHE_CAPACITY`, `SOUK_LOCAL_CACHE_TTL_SECS`,
	/// `SOUK_RATE_LIMIT_MAX`, `SOUK_RATE_LIMIT_WINDOW_SECS`,
	/// `SOUK_RATE_SWEEP_SECS`, `SOUK_JOB_TIMEOUT_SECS`.
	pub fn from_env() -> Self {
		let defaults = Self::default();
		Self {
			app_name: env_str("APP_NAME").unwrap_or(defaults.app_name),
			environment: env_str("ENV").unwrap_or(defaults.environment),
			redis_url: env_str("REDIS_URL"),
			local_cache_capacity: env_parse("LOCAL_CACHE_CAPACITY")
				.unwrap_or(defaults.local_cache_capacity),
			local_cache_ttl: env_parse("LOCAL_CACHE_TTL_SECS")
				.map(Duration::from_secs)
				.unwrap_or(defaults.local_cache_ttl),
			rate_limit_max_requests: env_parse("RATE_LIMIT_MAX")
				.unwrap_or(defaults.rate_limit_max_requests),
			rate_limit_window: env_parse("RATE_LIMIT_WINDOW_SECS")
				.map(Duration::from_secs)
				.unwrap_or(defaults.rate_limit_window),
			rate_limit_sweep_interval: env_parse("RATE_SWEEP_SECS")
				.map(Duration::from_secs)
				.unwrap_or(defaults.rate_limit_sweep_interval),
			job_timeout: env_parse("JOB_TIMEOUT_SECS")
				.map(Duration::from_secs)
				.unwrap_or(defaults.job_timeout),
		}
	}

	pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
		self.app_name = app_name.into();
		self
	}

	pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
		self.environment = environment.into();
		self
	}

	pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
		self.redis_url = Some(url.into());
		self
	}
}

fn env_str(key: &str) -> Option<String> {
	env::var(format!("{ENV_PREFIX}{key}"))
		.ok()
		.filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
	let raw = env_str(key)?;
	match raw.parse() {
		Ok(value) => Some(value),
		Err(_) => {
			tracing::warn!(key = %format!("{ENV_PREFIX}{key}"), "ignoring unparseable setting");
			None
		}
	}
}
