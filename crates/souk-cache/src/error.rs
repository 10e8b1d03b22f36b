//! Cache error types

use thiserror::Error;

/// Errors raised by cache components.
///
/// Remote-store unavailability is deliberately absent: it is recovered
/// internally through the local fallback tier and never reaches callers.
#[derive(Debug, Error)]
pub enum CacheError {
	/// Value could not be serialized for storage
	#[error("serialization failed: {0}")]
	Serialization(String),

	/// The source-of-truth callback passed to a strategy failed
	#[error("source fetch failed: {0}")]
	Fetch(String),

	/// The authoritative update passed to write-through failed
	#[error("authoritative update failed: {0}")]
	Update(String),

	/// The deferred persist passed to write-behind failed
	#[error("persist failed: {0}")]
	Persist(String),
}

impl CacheError {
	/// Wrap an arbitrary source-of-truth error into a fetch error
	pub fn fetch(err: impl std::fmt::Display) -> Self {
		Self::Fetch(err.to_string())
	}
}

pub type Result<T> = std::result::Result<T, CacheError>;
