//! Caching layer for the Souk platform
//!
//! Three tiers of caching for a multi-vendor commerce API:
//!
//! - [`LocalCache`]: bounded in-process LRU with per-entry TTL
//! - [`DistributedCache`]: Redis-backed with transparent local fallback
//! - [`strategy`]: consistency/latency policies composed over the tiers
//!   (write-through, write-behind, stale-while-revalidate, multi-tier,
//!   predictive prefetch, adaptive TTL) plus a strategy selector
//!
//! Remote-store failures never reach callers: reads and writes degrade to
//! the per-process fallback tier, and fire-and-forget population tasks log
//! their own errors.

mod distributed;
mod entry;
mod error;
pub mod keys;
mod local;
mod remote;
pub mod strategy;

pub use distributed::DistributedCache;
pub use error::{CacheError, Result};
pub use local::{LocalCache, LocalCacheStats};
pub use remote::{InMemoryRemoteStore, RemoteError, RemoteResult, RemoteStore};
pub use strategy::{
	AdaptiveTtl, Consistency, DataProfile, DataSize, Frequency, MultiTierCache, PrefetchEngine,
	StaleWhileRevalidate, StrategyKind, WriteBehind, WriteThrough, recommend_strategy,
};

#[cfg(feature = "redis-backend")]
pub use remote::RedisStore;
