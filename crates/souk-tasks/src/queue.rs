//! Priority job queue with retry backoff.
//!
//! One worker task owns all job state transitions. Producers only append
//! to the pending list and wake the worker, so there is no race over a
//! job's status: everything a caller observes through [`JobQueue`]
//! accessors is a snapshot taken under the state lock.

use crate::error::{TaskError, TaskResult};
use crate::handler::{self, JobContext, JobKind};
use crate::job::{Job, JobId, JobPriority, JobStatus};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant, sleep_until, timeout};

/// Tunables for a [`JobQueue`]
#[derive(Debug, Clone)]
pub struct QueueConfig {
	/// Upper bound on one handler invocation
	pub handler_timeout: Duration,
	/// Base of the exponential retry delay
	pub backoff_base: Duration,
	/// Ceiling for the retry delay
	pub backoff_cap: Duration,
	/// How many completed jobs to keep for inspection
	pub completed_history: usize,
	/// How many failed jobs to keep for inspection and retry
	pub failed_history: usize,
}

impl Default for QueueConfig {
	fn default() -> Self {
		Self {
			handler_timeout: Duration::from_secs(30),
			backoff_base: Duration::from_secs(1),
			backoff_cap: Duration::from_secs(60),
			completed_history: 100,
			failed_history: 50,
		}
	}
}

/// Queue depth snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
	pub pending: usize,
	pub processing: usize,
	pub completed: usize,
	pub failed: usize,
}

struct Scheduled {
	job: Job,
	run_at: Instant,
	seq: u64,
}

#[derive(Default)]
struct QueueState {
	pending: Vec<Scheduled>,
	processing: HashMap<JobId, Job>,
	completed: VecDeque<Job>,
	failed: VecDeque<Job>,
	next_seq: u64,
	closed: bool,
}

struct QueueInner {
	config: QueueConfig,
	ctx: JobContext,
	state: Mutex<QueueState>,
	wake: Notify,
}

/// In-process background job queue.
///
/// Jobs drain in priority order (1 before 5), ties broken by enqueue
/// order. A failed job is re-enqueued with exponential backoff until its
/// attempt budget is spent, then lands in the failed history where
/// [`retry_job`](Self::retry_job) can resurrect it.
///
/// The drain loop starts on the first enqueue; [`start`](Self::start)
/// exists for callers that want the worker warm before any job arrives.
///
/// # Examples
///
/// ```
/// use souk_tasks::{JobContext, JobKind, JobQueue};
///
/// # tokio_test::block_on(async {
/// let queue = JobQueue::new(JobContext::new());
///
/// let id = queue
/// 	.enqueue(JobKind::SendEmail {
/// 		to: "buyer@example.com".to_string(),
/// 		subject: "Order confirmed".to_string(),
/// 		html: "<p>thanks</p>".to_string(),
/// 	})
/// 	.await
/// 	.unwrap();
/// assert!(queue.job_status(id).await.is_some());
/// queue.shutdown().await;
/// # });
/// ```
pub struct JobQueue {
	inner: Arc<QueueInner>,
	worker_handle: StdMutex<Option<AbortHandle>>,
}

impl JobQueue {
	/// Creates a queue with default tunables
	pub fn new(ctx: JobContext) -> Self {
		Self::with_config(ctx, QueueConfig::default())
	}

	pub fn with_config(ctx: JobContext, config: QueueConfig) -> Self {
		Self {
			inner: Arc::new(QueueInner {
				config,
				ctx,
				state: Mutex::new(QueueState::default()),
				wake: Notify::new(),
			}),
			worker_handle: StdMutex::new(None),
		}
	}

	/// Starts the worker task if none is running.
	///
	/// Enqueuing starts the worker on its own; this is for callers that
	/// want it warm ahead of the first job.
	pub fn start(&self) {
		let mut guard = self
			.worker_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
			return;
		}
		let inner = Arc::clone(&self.inner);
		let handle = tokio::spawn(async move {
			worker_loop(inner).await;
		})
		.abort_handle();
		*guard = Some(handle);
	}

	/// Stops the worker and rejects further enqueues.
	///
	/// An in-flight job settles first; pending jobs stay queued but are no
	/// longer drained.
	pub async fn shutdown(&self) {
		{
			let mut state = self.inner.state.lock().await;
			state.closed = true;
		}
		self.inner.wake.notify_one();

		while !self.inner.state.lock().await.processing.is_empty() {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}

		let mut guard = self
			.worker_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(handle) = guard.take() {
			handle.abort();
		}
		tracing::debug!("job queue shut down");
	}

	/// Enqueues a job with default priority and retry budget
	pub async fn enqueue(&self, kind: JobKind) -> TaskResult<JobId> {
		self.enqueue_job(Job::new(kind)).await
	}

	/// Enqueues a job with an explicit priority
	pub async fn enqueue_with_priority(
		&self,
		kind: JobKind,
		priority: JobPriority,
	) -> TaskResult<JobId> {
		self.enqueue_job(Job::new(kind).with_priority(priority)).await
	}

	/// Enqueues a fully configured job
	pub async fn enqueue_job(&self, job: Job) -> TaskResult<JobId> {
		let id = job.id;
		{
			let mut state = self.inner.state.lock().await;
			if state.closed {
				return Err(TaskError::QueueClosed);
			}
			let seq = state.next_seq;
			state.next_seq += 1;
			tracing::debug!(job_id = %id, kind = job.kind.name(), priority = job.priority.value(), "enqueued job");
			state.pending.push(Scheduled {
				job,
				run_at: Instant::now(),
				seq,
			});
		}
		self.start();
		self.inner.wake.notify_one();
		Ok(id)
	}

	/// Current status of a job, or `None` once it has aged out of the
	/// history rings
	pub async fn job_status(&self, id: JobId) -> Option<JobStatus> {
		self.job(id).await.map(|job| job.status)
	}

	/// Snapshot of a job wherever it currently lives
	pub async fn job(&self, id: JobId) -> Option<Job> {
		let state = self.inner.state.lock().await;
		state
			.pending
			.iter()
			.map(|scheduled| &scheduled.job)
			.chain(state.processing.values())
			.chain(state.completed.iter())
			.chain(state.failed.iter())
			.find(|job| job.id == id)
			.cloned()
	}

	/// Up to `limit` most recent completed jobs, newest last
	pub async fn completed_jobs(&self, limit: usize) -> Vec<Job> {
		let state = self.inner.state.lock().await;
		recent(&state.completed, limit)
	}

	/// Up to `limit` most recent failed jobs, newest last
	pub async fn failed_jobs(&self, limit: usize) -> Vec<Job> {
		let state = self.inner.state.lock().await;
		recent(&state.failed, limit)
	}

	/// Moves a failed job back to pending with a fresh attempt budget
	pub async fn retry_job(&self, id: JobId) -> TaskResult<()> {
		{
			let mut state = self.inner.state.lock().await;
			if state.closed {
				return Err(TaskError::QueueClosed);
			}
			let index = state
				.failed
				.iter()
				.position(|job| job.id == id)
				.ok_or(TaskError::JobNotFound(id))?;
			let mut job = state
				.failed
				.remove(index)
				.ok_or(TaskError::JobNotFound(id))?;
			job.status = JobStatus::Pending;
			job.attempts = 0;
			job.last_error = None;
			job.processed_at = None;

			let seq = state.next_seq;
			state.next_seq += 1;
			tracing::info!(job_id = %id, kind = job.kind.name(), "re-enqueued failed job");
			state.pending.push(Scheduled {
				job,
				run_at: Instant::now(),
				seq,
			});
		}
		self.start();
		self.inner.wake.notify_one();
		Ok(())
	}

	/// Queue depth across all lifecycle states
	pub async fn stats(&self) -> QueueStats {
		let state = self.inner.state.lock().await;
		QueueStats {
			pending: state.pending.len(),
			processing: state.processing.len(),
			completed: state.completed.len(),
			failed: state.failed.len(),
		}
	}
}

impl Drop for JobQueue {
	fn drop(&mut self) {
		let mut guard = self
			.worker_handle
			.lock()
			.unwrap_or_else(|e| e.into_inner());
		if let Some(handle) = guard.take() {
			handle.abort();
		}
	}
}

enum Next {
	Job(Job),
	WaitUntil(Instant),
	Idle,
}

async fn worker_loop(inner: Arc<QueueInner>) {
	loop {
		let next = {
			let mut state = inner.state.lock().await;
			if state.closed {
				break;
			}
			take_ready(&mut state)
		};

		match next {
			Next::Job(job) => run_job(&inner, job).await,
			Next::WaitUntil(at) => {
				tokio::select! {
					_ = inner.wake.notified() => {}
					_ = sleep_until(at) => {}
				}
			}
			Next::Idle => inner.wake.notified().await,
		}
	}
}

/// Picks the highest-priority ready job, ties broken by enqueue order
fn take_ready(state: &mut QueueState) -> Next {
	let now = Instant::now();
	let mut best: Option<(usize, u8, u64)> = None;
	let mut earliest: Option<Instant> = None;

	for (index, scheduled) in state.pending.iter().enumerate() {
		if scheduled.run_at > now {
			earliest = Some(match earliest {
				Some(at) if at <= scheduled.run_at => at,
				_ => scheduled.run_at,
			});
			continue;
		}
		let candidate = (index, scheduled.job.priority.value(), scheduled.seq);
		best = Some(match best {
			Some(current) if (current.1, current.2) <= (candidate.1, candidate.2) => current,
			_ => candidate,
		});
	}

	match (best, earliest) {
		(Some((index, _, _)), _) => {
			let mut job = state.pending.remove(index).job;
			job.status = JobStatus::Processing;
			job.attempts += 1;
			state.processing.insert(job.id, job.clone());
			Next::Job(job)
		}
		(None, Some(at)) => Next::WaitUntil(at),
		(None, None) => Next::Idle,
	}
}

async fn run_job(inner: &Arc<QueueInner>, job: Job) {
	let started = Instant::now();
	let result = match timeout(inner.config.handler_timeout, handler::execute(&job.kind, &inner.ctx)).await
	{
		Ok(result) => result,
		Err(_) => Err(TaskError::Timeout(inner.config.handler_timeout.as_secs())),
	};

	let mut state = inner.state.lock().await;
	let mut job = match state.processing.remove(&job.id) {
		Some(job) => job,
		None => return,
	};
	job.processed_at = Some(chrono::Utc::now());

	match result {
		Ok(()) => {
			job.status = JobStatus::Completed;
			job.last_error = None;
			tracing::info!(
				job_id = %job.id,
				kind = job.kind.name(),
				elapsed_ms = started.elapsed().as_millis() as u64,
				"job completed"
			);
			push_capped(&mut state.completed, job, inner.config.completed_history);
		}
		Err(error) => {
			job.last_error = Some(error.to_string());
			if job.attempts >= job.max_attempts {
				job.status = JobStatus::Failed;
				tracing::error!(
					job_id = %job.id,
					kind = job.kind.name(),
					attempts = job.attempts,
					error = %error,
					"job failed permanently"
				);
				push_capped(&mut state.failed, job, inner.config.failed_history);
			} else {
				let delay = retry_delay(&inner.config, job.attempts);
				tracing::warn!(
					job_id = %job.id,
					kind = job.kind.name(),
					attempt = job.attempts,
					retry_in_ms = delay.as_millis() as u64,
					error = %error,
					"job failed, retrying"
				);
				job.status = JobStatus::Pending;
				let seq = state.next_seq;
				state.next_seq += 1;
				state.pending.push(Scheduled {
					job,
					run_at: Instant::now() + delay,
					seq,
				});
			}
		}
	}
}

/// Exponential delay doubling per attempt, clamped to the configured cap
fn retry_delay(config: &QueueConfig, attempts: u32) -> Duration {
	let factor = 2u32.saturating_pow(attempts.min(16));
	config
		.backoff_base
		.saturating_mul(factor)
		.min(config.backoff_cap)
}

fn recent(ring: &VecDeque<Job>, limit: usize) -> Vec<Job> {
	ring.iter()
		.skip(ring.len().saturating_sub(limit))
		.cloned()
		.collect()
}

fn push_capped(ring: &mut VecDeque<Job>, job: Job, cap: usize) {
	ring.push_back(job);
	while ring.len() > cap {
		ring.pop_front();
	}
}
