//! Fixed-window rate limiting for the storefront API.
//!
//! A [`RateLimiter`] counts requests per client identifier against a
//! [`CounterBackend`]. Production deployments run the Redis backend so
//! the window is shared across instances; when Redis is unreachable the
//! limiter degrades to an in-process counter and, beyond that, fails
//! open.

pub mod backend;
pub mod identity;
pub mod limiter;
pub mod time_provider;

pub use backend::{CounterBackend, MemoryCounterBackend};
pub use identity::client_identifier;
pub use limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use time_provider::{MockTimeProvider, SystemTimeProvider, TimeProvider};

#[cfg(feature = "redis-backend")]
pub use backend::RedisCounterBackend;

use thiserror::Error;

/// Errors surfaced by counter backends
#[derive(Debug, Error)]
pub enum ThrottleError {
	#[error("counter backend error: {0}")]
	Backend(String),
}
