//! Error types for the job queue

use crate::job::JobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
	#[error("handler error: {0}")]
	Handler(String),

	#[error("job {0} not found")]
	JobNotFound(JobId),

	#[error("job timed out after {0} seconds")]
	Timeout(u64),

	#[error("queue is shut down")]
	QueueClosed,

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl TaskError {
	/// Shorthand for a handler failure with a formatted message
	pub fn handler(message: impl Into<String>) -> Self {
		Self::Handler(message.into())
	}
}

pub type TaskResult<T> = Result<T, TaskError>;
