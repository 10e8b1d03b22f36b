//! Background job processing for the Souk platform.
//!
//! A [`JobQueue`] drains [`JobKind`] jobs in priority order on a single
//! worker task, retrying failures with exponential backoff and keeping
//! bounded histories of completed and failed jobs. Job kinds are a
//! closed enum, so every handler is dispatched by match and payloads
//! are validated when jobs are built, not when they run.

pub mod error;
pub mod handler;
pub mod job;
pub mod queue;

pub use error::{TaskError, TaskResult};
pub use handler::{CacheTarget, JobContext, JobKind};
pub use job::{Job, JobId, JobPriority, JobStatus};
pub use queue::{JobQueue, QueueConfig, QueueStats};
