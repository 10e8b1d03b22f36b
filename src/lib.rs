//! Souk infrastructure: caching, rate limiting, and background jobs for
//! a multi-vendor commerce API.
//!
//! The member crates do the work; this facade re-exports them and ties
//! them together in an [`InfraContext`] built once at startup:
//!
//! - [`cache`]: local LRU tier, Redis-backed distributed tier, and
//!   consistency strategies composed over both
//! - [`throttling`]: fixed-window rate limiting with fail-open
//!   degradation
//! - [`tasks`]: priority job queue with retry backoff
//!
//! ```
//! use souk::{InfraContext, InfraSettings};
//!
//! # tokio_test::block_on(async {
//! let infra = InfraContext::init(InfraSettings::from_env()).await;
//! // hand `infra` to request handlers
//! infra.shutdown().await;
//! # });
//! ```

#[cfg(feature = "cache")]
pub use souk_cache as cache;

#[cfg(feature = "tasks")]
pub use souk_tasks as tasks;

#[cfg(feature = "throttling")]
pub use souk_throttling as throttling;

#[cfg(all(feature = "cache", feature = "throttling", feature = "tasks"))]
mod context;
mod settings;

#[cfg(all(feature = "cache", feature = "throttling", feature = "tasks"))]
pub use context::InfraContext;
pub use settings::InfraSettings;
