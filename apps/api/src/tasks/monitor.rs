//! Task monitor. Drives one generation task from PENDING to a terminal state.
//!
//! Polls the generation service on a fixed interval (first poll one interval
//! after start) until it reports SUCCESS or FAILURE, or until the deadline
//! passes. SUCCESS is written to the record only after the result has been
//! persisted. Polling errors are logged and retried on the next tick; there is
//! no backoff and no retry cap.
//!
//! A terminal status that cannot be written is retried with a doubling backoff
//! (capped at the poll interval) until the deadline, or for one more poll
//! interval when the deadline itself produced the status.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::store::{TaskRecordStore, TaskStatus};
use crate::generation_client::types::RemoteStatus;
use crate::generation_client::GenerationService;
use crate::metrics;
use crate::persistence::{FileSource, PersistRequest, PersistencePipeline};

/// First delay before re-writing a terminal status.
const TERMINAL_WRITE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct MonitoredJob {
    pub task_id: String,
    pub resume_id: i64,
    pub user_id: i64,
    pub tenant_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    Succeeded,
    Failed,
    TimedOut,
    /// Supervisor shut down before a terminal state.
    Cancelled,
}

impl MonitorOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            MonitorOutcome::Succeeded => "success",
            MonitorOutcome::Failed => "failed",
            MonitorOutcome::TimedOut => "timeout",
            MonitorOutcome::Cancelled => "cancelled",
        }
    }
}

/// Per-run timing shared by the poll step and terminal writes.
struct RunClock<'a> {
    deadline: Instant,
    cancel: &'a CancellationToken,
}

#[derive(Clone)]
pub struct TaskMonitor {
    generation: Arc<dyn GenerationService>,
    records: TaskRecordStore,
    pipeline: PersistencePipeline,
    poll_interval: Duration,
    deadline: Duration,
}

impl TaskMonitor {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        records: TaskRecordStore,
        pipeline: PersistencePipeline,
        poll_interval: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            generation,
            records,
            pipeline,
            poll_interval,
            deadline,
        }
    }

    pub async fn run(&self, job: MonitoredJob, cancel: CancellationToken) -> MonitorOutcome {
        let started = Instant::now();
        let mut ticker = interval_at(started + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let clock = RunClock {
            deadline: started + self.deadline,
            cancel: &cancel,
        };
        let deadline = sleep_until(clock.deadline);
        tokio::pin!(deadline);

        info!(task_id = %job.task_id, resume_id = job.resume_id, "Monitoring generation task");

        let outcome = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(task_id = %job.task_id, "Monitor cancelled before a terminal state");
                    break MonitorOutcome::Cancelled;
                }
                _ = &mut deadline => {
                    error!(task_id = %job.task_id, "Generation task timed out after {:?}", self.deadline);
                    self.finish(&job, TaskStatus::Timeout, &clock).await;
                    break MonitorOutcome::TimedOut;
                }
                _ = ticker.tick() => {
                    if let Some(outcome) = self.poll_once(&job, &clock).await {
                        break outcome;
                    }
                }
            }
        };
        metrics::record_generation(outcome.as_str(), started.elapsed());
        outcome
    }

    async fn poll_once(&self, job: &MonitoredJob, clock: &RunClock<'_>) -> Option<MonitorOutcome> {
        let reply = match self.generation.task_status(&job.task_id).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(task_id = %job.task_id, "Task status poll failed, retrying next tick: {e}");
                return None;
            }
        };
        debug!(task_id = %job.task_id, status = ?reply.status, "Task status polled");

        match reply.status {
            RemoteStatus::Pending | RemoteStatus::Unknown => None,
            RemoteStatus::Processing => {
                self.mark_processing(job).await;
                None
            }
            RemoteStatus::Failure => {
                error!(task_id = %job.task_id, "Generation task failed upstream");
                self.finish(job, TaskStatus::Failure, clock).await;
                Some(MonitorOutcome::Failed)
            }
            RemoteStatus::Success => {
                let Some(data) = reply.result else {
                    error!(task_id = %job.task_id, "Upstream reported SUCCESS without a result");
                    self.finish(job, TaskStatus::Failure, clock).await;
                    return Some(MonitorOutcome::Failed);
                };
                let request = PersistRequest {
                    resume_id: job.resume_id,
                    user_id: job.user_id,
                    tenant_id: job.tenant_id,
                    data,
                    raw_markdown: None,
                    source: FileSource::Render,
                };
                match self.pipeline.persist(request).await {
                    Ok(_) => {
                        self.finish(job, TaskStatus::Success, clock).await;
                        info!(task_id = %job.task_id, resume_id = job.resume_id, "Resume generation completed");
                        Some(MonitorOutcome::Succeeded)
                    }
                    Err(e) => {
                        error!(task_id = %job.task_id, "Persisting generated resume failed: {e}");
                        self.finish(job, TaskStatus::Failure, clock).await;
                        Some(MonitorOutcome::Failed)
                    }
                }
            }
        }
    }

    async fn mark_processing(&self, job: &MonitoredJob) {
        match self.records.get(&job.task_id).await {
            Ok(Some(record)) if record.status == TaskStatus::Pending => {
                if let Err(e) = self
                    .records
                    .update_status(&job.task_id, TaskStatus::Processing)
                    .await
                {
                    warn!(task_id = %job.task_id, "Failed to mark task processing: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(task_id = %job.task_id, "Failed to read task record: {e}"),
        }
    }

    /// Writes a terminal status, retrying while the store is unavailable.
    async fn finish(&self, job: &MonitoredJob, status: TaskStatus, clock: &RunClock<'_>) {
        let give_up = clock.deadline.max(Instant::now() + self.poll_interval);
        let mut backoff = TERMINAL_WRITE_BACKOFF.min(self.poll_interval);
        loop {
            let e = match self.records.update_status(&job.task_id, status).await {
                Ok(()) => return,
                Err(e) => e,
            };
            let retry_at = Instant::now() + backoff;
            if retry_at > give_up {
                error!(task_id = %job.task_id, status = %status, "Giving up on recording terminal status: {e}");
                return;
            }
            warn!(
                task_id = %job.task_id,
                status = %status,
                "Failed to record terminal status, retrying in {backoff:?}: {e}"
            );
            tokio::select! {
                biased;
                _ = clock.cancel.cancelled() => return,
                _ = sleep_until(retry_at) => {}
            }
            backoff = (backoff * 2).min(self.poll_interval);
        }
    }
}
