//! Strategy recommendation from declared data characteristics

use std::fmt;

/// How often something happens, as declared by the data's owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
	Low,
	Medium,
	High,
}

/// Required consistency between cache and source of truth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
	/// Staleness is fine well past the freshness window
	Relaxed,
	/// Bounded staleness is acceptable
	Eventual,
	/// The cache must never serve data older than the last committed write
	Critical,
}

/// Rough payload size class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSize {
	Small,
	Medium,
	Large,
}

/// Declared characteristics of one kind of cached data
#[derive(Debug, Clone, Copy)]
pub struct DataProfile {
	pub update_frequency: Frequency,
	pub read_frequency: Frequency,
	pub consistency: Consistency,
	pub data_size: DataSize,
}

/// The strategy family a profile maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
	CacheAside,
	WriteThrough,
	WriteBehind,
	StaleWhileRevalidate,
	MultiTier,
}

impl fmt::Display for StrategyKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::CacheAside => "cache-aside",
			Self::WriteThrough => "write-through",
			Self::WriteBehind => "write-behind",
			Self::StaleWhileRevalidate => "stale-while-revalidate",
			Self::MultiTier => "multi-tier",
		};
		f.write_str(name)
	}
}

/// Recommend a caching strategy for a data profile.
///
/// Precedence, first match wins:
/// 1. Critical consistency forces write-through when updates are frequent,
///    cache-aside otherwise (the cache must never lag a committed write).
/// 2. High read with low update favors multi-tier.
/// 3. High update with eventual consistency favors write-behind.
/// 4. Relaxed consistency favors stale-while-revalidate.
/// 5. Everything else defaults to cache-aside.
///
/// # Examples
///
/// ```
/// use souk_cache::{Consistency, DataProfile, DataSize, Frequency, StrategyKind, recommend_strategy};
///
/// let profile = DataProfile {
///     update_frequency: Frequency::Low,
///     read_frequency: Frequency::High,
///     consistency: Consistency::Eventual,
///     data_size: DataSize::Small,
/// };
/// assert_eq!(recommend_strategy(&profile), StrategyKind::MultiTier);
/// ```
pub fn recommend_strategy(profile: &DataProfile) -> StrategyKind {
	if profile.consistency == Consistency::Critical {
		return if profile.update_frequency == Frequency::High {
			StrategyKind::WriteThrough
		} else {
			StrategyKind::CacheAside
		};
	}

	if profile.read_frequency == Frequency::High && profile.update_frequency == Frequency::Low {
		return StrategyKind::MultiTier;
	}

	if profile.update_frequency == Frequency::High
		&& profile.consistency == Consistency::Eventual
	{
		return StrategyKind::WriteBehind;
	}

	if profile.consistency == Consistency::Relaxed {
		return StrategyKind::StaleWhileRevalidate;
	}

	StrategyKind::CacheAside
}

#[cfg(test)]
mod tests {
	use super::*;

	fn profile(
		update: Frequency,
		read: Frequency,
		consistency: Consistency,
	) -> DataProfile {
		DataProfile {
			update_frequency: update,
			read_frequency: read,
			consistency,
			data_size: DataSize::Small,
		}
	}

	#[test]
	fn test_critical_consistency_dominates() {
		// Even a read-heavy profile must not get a stale-tolerant strategy
		let p = profile(Frequency::High, Frequency::High, Consistency::Critical);
		assert_eq!(recommend_strategy(&p), StrategyKind::WriteThrough);

		let p = profile(Frequency::Low, Frequency::High, Consistency::Critical);
		assert_eq!(recommend_strategy(&p), StrategyKind::CacheAside);
	}

	#[test]
	fn test_read_heavy_gets_multi_tier() {
		let p = profile(Frequency::Low, Frequency::High, Consistency::Eventual);
		assert_eq!(recommend_strategy(&p), StrategyKind::MultiTier);
	}

	#[test]
	fn test_write_heavy_eventual_gets_write_behind() {
		let p = profile(Frequency::High, Frequency::Medium, Consistency::Eventual);
		assert_eq!(recommend_strategy(&p), StrategyKind::WriteBehind);
	}

	#[test]
	fn test_relaxed_gets_swr() {
		let p = profile(Frequency::Medium, Frequency::Medium, Consistency::Relaxed);
		assert_eq!(recommend_strategy(&p), StrategyKind::StaleWhileRevalidate);
	}

	#[test]
	fn test_default_is_cache_aside() {
		let p = profile(Frequency::Medium, Frequency::Medium, Consistency::Eventual);
		assert_eq!(recommend_strategy(&p), StrategyKind::CacheAside);
	}

	#[test]
	fn test_display_names() {
		assert_eq!(StrategyKind::WriteBehind.to_string(), "write-behind");
		assert_eq!(
			StrategyKind::StaleWhileRevalidate.to_string(),
			"stale-while-revalidate"
		);
	}
}
