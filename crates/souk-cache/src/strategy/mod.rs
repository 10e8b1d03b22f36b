//! Caching strategies
//!
//! A family of independent policies composed over [`LocalCache`] and
//! [`DistributedCache`], each trading consistency against latency in a
//! different way. [`recommend_strategy`] picks one from declared data
//! characteristics.
//!
//! [`LocalCache`]: crate::LocalCache
//! [`DistributedCache`]: crate::DistributedCache

mod adaptive_ttl;
mod multi_tier;
mod predictive;
mod selector;
mod swr;
mod write_behind;
mod write_through;

pub use adaptive_ttl::AdaptiveTtl;
pub use multi_tier::MultiTierCache;
pub use predictive::PrefetchEngine;
pub use selector::{
	Consistency, DataProfile, DataSize, Frequency, StrategyKind, recommend_strategy,
};
pub use swr::StaleWhileRevalidate;
pub use write_behind::WriteBehind;
pub use write_through::WriteThrough;
