//! Remote key-value store abstraction
//!
//! The distributed cache talks to a Redis-compatible store through the
//! [`RemoteStore`] trait so that tests can swap a real connection for an
//! in-memory fake, including one that simulates an outage.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::RwLock;

/// Error from the remote store. Callers of the cache never see this type;
/// every failure is recovered through the local fallback tier.
#[derive(Debug, Clone, Error)]
#[error("remote store error: {0}")]
pub struct RemoteError(pub String);

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Redis-compatible single-key operations.
///
/// All values are serialized strings. Every method is a suspension point;
/// implementations must treat each call as independently fallible.
#[async_trait]
pub trait RemoteStore: Send + Sync {
	async fn get(&self, key: &str) -> RemoteResult<Option<String>>;
	async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> RemoteResult<()>;
	async fn del(&self, keys: &[String]) -> RemoteResult<u64>;
	async fn keys(&self, pattern: &str) -> RemoteResult<Vec<String>>;
	async fn exists(&self, key: &str) -> RemoteResult<bool>;
	async fn incr(&self, key: &str) -> RemoteResult<i64>;
	async fn expire(&self, key: &str, ttl_secs: u64) -> RemoteResult<()>;
	async fn ttl(&self, key: &str) -> RemoteResult<i64>;
	async fn ping(&self) -> RemoteResult<()>;
	async fn flush(&self) -> RemoteResult<()>;
}

/// Redis-backed [`RemoteStore`] using a multiplexed connection manager
#[cfg(feature = "redis-backend")]
pub struct RedisStore {
	manager: redis::aio::ConnectionManager,
}

#[cfg(feature = "redis-backend")]
impl RedisStore {
	/// Connect to the given Redis URL
	///
	/// # Examples
	///
	/// ```no_run
	/// use souk_cache::RedisStore;
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
	/// # Ok(())
	/// # }
	/// ```
	pub async fn connect(url: &str) -> RemoteResult<Self> {
		let client = redis::Client::open(url).map_err(|e| RemoteError(e.to_string()))?;
		let manager = redis::aio::ConnectionManager::new(client)
			.await
			.map_err(|e| RemoteError(e.to_string()))?;
		Ok(Self { manager })
	}
}

#[cfg(feature = "redis-backend")]
#[async_trait]
impl RemoteStore for RedisStore {
	async fn get(&self, key: &str) -> RemoteResult<Option<String>> {
		use redis::AsyncCommands;
		let mut conn = self.manager.clone();
		conn.get(key).await.map_err(|e| RemoteError(e.to_string()))
	}

	async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> RemoteResult<()> {
		use redis::AsyncCommands;
		let mut conn = self.manager.clone();
		conn.set_ex(key, value, ttl_secs)
			.await
			.map_err(|e| RemoteError(e.to_string()))
	}

	async fn del(&self, keys: &[String]) -> RemoteResult<u64> {
		use redis::AsyncCommands;
		if keys.is_empty() {
			return Ok(0);
		}
		let mut conn = self.manager.clone();
		conn.del(keys).await.map_err(|e| RemoteError(e.to_string()))
	}

	async fn keys(&self, pattern: &str) -> RemoteResult<Vec<String>> {
		use redis::AsyncCommands;
		let mut conn = self.manager.clone();
		conn.keys(pattern)
			.await
			.map_err(|e| RemoteError(e.to_string()))
	}

	async fn exists(&self, key: &str) -> RemoteResult<bool> {
		use redis::AsyncCommands;
		let mut conn = self.manager.clone();
		conn.exists(key)
			.await
			.map_err(|e| RemoteError(e.to_string()))
	}

	async fn incr(&self, key: &str) -> RemoteResult<i64> {
		use redis::AsyncCommands;
		let mut conn = self.manager.clone();
		conn.incr(key, 1)
			.await
			.map_err(|e| RemoteError(e.to_string()))
	}

	async fn expire(&self, key: &str, ttl_secs: u64) -> RemoteResult<()> {
		use redis::AsyncCommands;
		let mut conn = self.manager.clone();
		let _: bool = conn
			.expire(key, ttl_secs as i64)
			.await
			.map_err(|e| RemoteError(e.to_string()))?;
		Ok(())
	}

	async fn ttl(&self, key: &str) -> RemoteResult<i64> {
		use redis::AsyncCommands;
		let mut conn = self.manager.clone();
		conn.ttl(key).await.map_err(|e| RemoteError(e.to_string()))
	}

	async fn ping(&self) -> RemoteResult<()> {
		let mut conn = self.manager.clone();
		redis::cmd("PING")
			.query_async::<()>(&mut conn)
			.await
			.map_err(|e| RemoteError(e.to_string()))
	}

	async fn flush(&self) -> RemoteResult<()> {
		let mut conn = self.manager.clone();
		redis::cmd("FLUSHDB")
			.query_async::<()>(&mut conn)
			.await
			.map_err(|e| RemoteError(e.to_string()))
	}
}

#[derive(Clone)]
struct StoredValue {
	value: String,
	expires_at: Option<SystemTime>,
}

impl StoredValue {
	fn is_expired(&self) -> bool {
		self.expires_at
			.map(|at| SystemTime::now() > at)
			.unwrap_or(false)
	}
}

/// In-memory [`RemoteStore`] used in tests and redis-less deployments.
///
/// `set_available(false)` makes every operation fail, simulating a remote
/// outage so fallback paths can be exercised.
///
/// # Examples
///
/// ```
/// use souk_cache::InMemoryRemoteStore;
/// use souk_cache::RemoteStore;
///
/// # async fn example() {
/// let store = InMemoryRemoteStore::new();
/// store.set_ex("k", "v", 60).await.unwrap();
/// assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
///
/// store.set_available(false);
/// assert!(store.get("k").await.is_err());
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryRemoteStore {
	data: Arc<RwLock<HashMap<String, StoredValue>>>,
	available: Arc<AtomicBool>,
}

impl Default for InMemoryRemoteStore {
	fn default() -> Self {
		Self::new()
	}
}

impl InMemoryRemoteStore {
	pub fn new() -> Self {
		Self {
			data: Arc::new(RwLock::new(HashMap::new())),
			available: Arc::new(AtomicBool::new(true)),
		}
	}

	/// Toggle simulated availability
	pub fn set_available(&self, available: bool) {
		self.available.store(available, Ordering::SeqCst);
	}

	fn check_available(&self) -> RemoteResult<()> {
		if self.available.load(Ordering::SeqCst) {
			Ok(())
		} else {
			Err(RemoteError("store unavailable".to_string()))
		}
	}

	fn glob_matches(pattern: &str, key: &str) -> bool {
		crate::keys::glob_to_regex(pattern)
			.map(|re| re.is_match(key))
			.unwrap_or(false)
	}
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
	async fn get(&self, key: &str) -> RemoteResult<Option<String>> {
		self.check_available()?;
		let mut data = self.data.write().await;
		if let Some(stored) = data.get(key) {
			if stored.is_expired() {
				data.remove(key);
				return Ok(None);
			}
			return Ok(Some(stored.value.clone()));
		}
		Ok(None)
	}

	async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> RemoteResult<()> {
		self.check_available()?;
		let mut data = self.data.write().await;
		data.insert(
			key.to_string(),
			StoredValue {
				value: value.to_string(),
				expires_at: Some(SystemTime::now() + Duration::from_secs(ttl_secs)),
			},
		);
		Ok(())
	}

	async fn del(&self, keys: &[String]) -> RemoteResult<u64> {
		self.check_available()?;
		let mut data = self.data.write().await;
		let mut removed = 0;
		for key in keys {
			if data.remove(key).is_some() {
				removed += 1;
			}
		}
		Ok(removed)
	}

	async fn keys(&self, pattern: &str) -> RemoteResult<Vec<String>> {
		self.check_available()?;
		let data = self.data.read().await;
		Ok(data
			.iter()
			.filter(|(key, stored)| !stored.is_expired() && Self::glob_matches(pattern, key))
			.map(|(key, _)| key.clone())
			.collect())
	}

	async fn exists(&self, key: &str) -> RemoteResult<bool> {
		self.check_available()?;
		let data = self.data.read().await;
		Ok(data.get(key).map(|s| !s.is_expired()).unwrap_or(false))
	}

	async fn incr(&self, key: &str) -> RemoteResult<i64> {
		self.check_available()?;
		let mut data = self.data.write().await;
		// An expired key restarts as a fresh counter with no TTL, as Redis
		// deletes the key before applying INCR
		let (current, expires_at) = match data.get(key) {
			Some(stored) if !stored.is_expired() => {
				(stored.value.parse::<i64>().unwrap_or(0), stored.expires_at)
			}
			_ => (0, None),
		};
		let next = current + 1;
		data.insert(
			key.to_string(),
			StoredValue {
				value: next.to_string(),
				expires_at,
			},
		);
		Ok(next)
	}

	async fn expire(&self, key: &str, ttl_secs: u64) -> RemoteResult<()> {
		self.check_available()?;
		let mut data = self.data.write().await;
		if let Some(stored) = data.get_mut(key) {
			stored.expires_at = Some(SystemTime::now() + Duration::from_secs(ttl_secs));
		}
		Ok(())
	}

	async fn ttl(&self, key: &str) -> RemoteResult<i64> {
		self.check_available()?;
		let data = self.data.read().await;
		match data.get(key) {
			Some(stored) if !stored.is_expired() => match stored.expires_at {
				Some(at) => Ok(at
					.duration_since(SystemTime::now())
					.map(|d| d.as_secs() as i64)
					.unwrap_or(0)),
				None => Ok(-1),
			},
			_ => Ok(-2),
		}
	}

	async fn ping(&self) -> RemoteResult<()> {
		self.check_available()
	}

	async fn flush(&self) -> RemoteResult<()> {
		self.check_available()?;
		let mut data = self.data.write().await;
		data.clear();
		Ok(())
	}
}
