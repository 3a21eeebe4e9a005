//! Background task queue for notification jobs.
//!
//! Jobs are queued on a bounded channel and executed by a worker task.
//! Each job is retried with exponential backoff until it succeeds or runs
//! out of attempts, giving at-least-once delivery per job.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::{JoinHandle, JoinSet},
};

use super::notifications::Notifier;
use crate::{
    config::TasksConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

/// Work executed in the background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    CheckoutNotification { loan_id: i32 },
}

/// Exponential backoff between attempts of one job
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl From<&TasksConfig> for RetryPolicy {
    fn from(config: &TasksConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// Handle used to submit jobs
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<Job>,
}

impl TaskQueue {
    /// Spawn the worker and return the queue handle.
    ///
    /// The worker stops once every handle is dropped and the jobs already
    /// queued or running have finished.
    pub fn start(
        repository: Repository,
        notifier: Arc<dyn Notifier>,
        config: &TasksConfig,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = TaskWorker {
            receiver,
            runner: JobRunner {
                repository,
                notifier,
                policy: RetryPolicy::from(config),
            },
        };
        (Self { sender }, tokio::spawn(worker.run()))
    }

    /// Submit a job without waiting for it to run.
    ///
    /// Returns false when the job could not be queued; the caller's own
    /// work is never affected.
    pub fn enqueue(&self, job: Job) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                tracing::error!(?job, "Task queue full, job dropped");
                false
            }
            Err(TrySendError::Closed(job)) => {
                tracing::error!(?job, "Task queue closed, job dropped");
                false
            }
        }
    }
}

struct TaskWorker {
    receiver: mpsc::Receiver<Job>,
    runner: JobRunner,
}

impl TaskWorker {
    async fn run(mut self) {
        tracing::info!("Task worker started");
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                job = self.receiver.recv() => match job {
                    Some(job) => {
                        let runner = self.runner.clone();
                        running.spawn(async move { runner.run_with_retry(job).await });
                    }
                    None => break,
                },
                Some(finished) = running.join_next() => {
                    if let Err(e) = finished {
                        tracing::error!(error = %e, "Task panicked");
                    }
                }
            }
        }

        while let Some(finished) = running.join_next().await {
            if let Err(e) = finished {
                tracing::error!(error = %e, "Task panicked");
            }
        }
        tracing::info!("Task worker stopped");
    }
}

#[derive(Clone)]
struct JobRunner {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl JobRunner {
    async fn run_with_retry(&self, job: Job) {
        let mut attempt = 1;
        loop {
            match self.run(job).await {
                Ok(()) => return,
                Err(AppError::NotFound(msg)) => {
                    tracing::warn!(?job, "Dropping job: {}", msg);
                    return;
                }
                Err(e) if attempt >= self.policy.max_attempts => {
                    tracing::error!(?job, attempt, error = %e, "Job failed, giving up");
                    return;
                }
                Err(e) => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(?job, attempt, ?delay, error = %e, "Job failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn run(&self, job: Job) -> AppResult<()> {
        match job {
            Job::CheckoutNotification { loan_id } => {
                let loan = self.repository.loans.get_details(loan_id).await?;
                self.notifier.notify_checkout(&loan).await
            }
        }
    }
}
