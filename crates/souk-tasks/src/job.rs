//! Job definitions and lifecycle state

use crate::handler::JobKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const JOB_MIN_PRIORITY: u8 = 1;
pub const JOB_MAX_PRIORITY: u8 = 5;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Unique identifier for a queued job
///
/// # Examples
///
/// ```
/// use souk_tasks::JobId;
///
/// let id1 = JobId::new();
/// let id2 = JobId::new();
/// assert_ne!(id1, id2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
	pub fn new() -> Self {
		Self(uuid::Uuid::new_v4())
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(uuid::Uuid::parse_str(s)?))
	}
}

/// Lifecycle state of a job.
///
/// Jobs move `Pending` → `Processing`, then to `Completed` on success or
/// back to `Pending` while retries remain, and to `Failed` once attempts
/// are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

/// Job priority, 1 (most urgent) through 5 (least urgent)
///
/// # Examples
///
/// ```
/// use souk_tasks::JobPriority;
///
/// let urgent = JobPriority::new(1);
/// let bulk = JobPriority::new(5);
/// assert!(urgent.value() < bulk.value());
///
/// // Out-of-range values are clamped
/// assert_eq!(JobPriority::new(0).value(), 1);
/// assert_eq!(JobPriority::new(40).value(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobPriority(u8);

impl JobPriority {
	pub fn new(priority: u8) -> Self {
		Self(priority.clamp(JOB_MIN_PRIORITY, JOB_MAX_PRIORITY))
	}

	pub fn value(&self) -> u8 {
		self.0
	}
}

impl Default for JobPriority {
	fn default() -> Self {
		Self(3)
	}
}

/// A queued unit of background work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
	pub id: JobId,
	pub kind: JobKind,
	pub priority: JobPriority,
	pub status: JobStatus,
	pub attempts: u32,
	pub max_attempts: u32,
	pub created_at: DateTime<Utc>,
	pub processed_at: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
}

impl Job {
	/// Creates a pending job with default priority and retry budget
	pub fn new(kind: JobKind) -> Self {
		Self {
			id: JobId::new(),
			kind,
			priority: JobPriority::default(),
			status: JobStatus::Pending,
			attempts: 0,
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			created_at: Utc::now(),
			processed_at: None,
			last_error: None,
		}
	}

	pub fn with_priority(mut self, priority: JobPriority) -> Self {
		self.priority = priority;
		self
	}

	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);
		self
	}
}
