use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backoff::{ future::retry, ExponentialBackoff };
use serde::Serialize;
use tokio::sync::mpsc::{ self, error::TrySendError };
use uuid::Uuid;

use crate::enums::JobFamily;
use crate::error::{ AppError, Result };
use crate::services::{ BalanceSyncService, FanOutReport, SettingsService, SettlementService };

const MAX_RETRY_DELAY: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTarget {
    All,
    Single(i32),
}

/// A queued unit of work. `attempts` is the total number of tries.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub family: JobFamily,
    pub target: JobTarget,
    pub attempts: u32,
}

impl Job {
    pub fn new(family: JobFamily, target: JobTarget, attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            family,
            target,
            attempts: attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    /// Outside active hours or processing disabled.
    pub skipped: bool,
    pub succeeded: usize,
    pub failed: usize,
}

impl JobOutcome {
    fn skipped() -> Self {
        Self { skipped: true, ..Default::default() }
    }

    fn single(processed: bool) -> Self {
        Self { succeeded: usize::from(processed), ..Default::default() }
    }
}

/// Sender half of one family's queue.
#[derive(Clone)]
pub struct JobQueue {
    family: JobFamily,
    sender: mpsc::Sender<Job>,
}

pub fn job_queue(family: JobFamily, capacity: usize) -> (JobQueue, mpsc::Receiver<Job>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (JobQueue { family, sender }, receiver)
}

impl JobQueue {
    pub fn family(&self) -> JobFamily {
        self.family
    }

    /// Enqueue without waiting. Fails when the queue is full or closed.
    pub fn try_enqueue(&self, target: JobTarget, attempts: u32) -> Result<Job> {
        let job = Job::new(self.family, target, attempts);

        match self.sender.try_send(job.clone()) {
            Ok(()) => Ok(job),
            Err(TrySendError::Full(_)) => Err(AppError::QueueFull(self.family.to_string())),
            Err(TrySendError::Closed(_)) => {
                Err(AppError::Internal(format!("{} worker stopped", self.family)))
            }
        }
    }
}

/// Runs a job against the services, behind the active-hours gate.
pub struct JobProcessor {
    settings: Arc<SettingsService>,
    settlement: Arc<SettlementService>,
    balance_sync: Arc<BalanceSyncService>,
}

impl JobProcessor {
    pub fn new(
        settings: Arc<SettingsService>,
        settlement: Arc<SettlementService>,
        balance_sync: Arc<BalanceSyncService>
    ) -> Self {
        Self {
            settings,
            settlement,
            balance_sync,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsService> {
        &self.settings
    }

    pub async fn process(&self, job: &Job) -> Result<JobOutcome> {
        if !self.settings.is_within_active_hours().await? {
            tracing::info!(job_id = %job.id, family = %job.family, "Outside active hours, skipping");
            return Ok(JobOutcome::skipped());
        }

        match (job.family, job.target) {
            (JobFamily::DepositCheck, JobTarget::All) => {
                let report = self.settlement.check_all().await?;
                fan_out_outcome(job.family, report)
            }
            (JobFamily::DepositCheck, JobTarget::Single(id)) => {
                let summary = self.settlement.check_single(id).await?;
                Ok(JobOutcome::single(summary.is_some()))
            }
            (JobFamily::BalanceSync, JobTarget::All) => {
                let report = self.balance_sync.sync_all().await?;
                fan_out_outcome(job.family, report)
            }
            (JobFamily::BalanceSync, JobTarget::Single(id)) => {
                let summary = self.balance_sync.sync_single(id).await?;
                Ok(JobOutcome::single(summary.is_some()))
            }
        }
    }
}

/// A fan-out job fails only when some credential was throttled, so the
/// retry backs off against the exchange.
fn fan_out_outcome<T>(family: JobFamily, report: FanOutReport<T>) -> Result<JobOutcome> {
    let throttled = report.rate_limited();
    if !throttled.is_empty() {
        return Err(
            AppError::RateLimited(format!("{} throttled for credentials {:?}", family, throttled))
        );
    }

    Ok(JobOutcome {
        skipped: false,
        succeeded: report.succeeded(),
        failed: report.failed(),
    })
}

/// Retry `operation` up to `job.attempts` times with exponential backoff
/// starting at `base_delay`.
pub async fn run_with_retry<F, Fut>(
    job: &Job,
    base_delay: Duration,
    mut operation: F
) -> Result<JobOutcome>
    where F: FnMut() -> Fut, Fut: Future<Output = Result<JobOutcome>>
{
    let backoff = ExponentialBackoff {
        current_interval: base_delay,
        initial_interval: base_delay,
        randomization_factor: 0.0,
        multiplier: 2.0,
        max_interval: MAX_RETRY_DELAY.max(base_delay),
        max_elapsed_time: None,
        ..Default::default()
    };

    let attempts = job.attempts.max(1);
    let mut attempt = 0u32;

    retry(backoff, || {
        attempt += 1;
        let current = attempt;
        let run = operation();

        async move {
            match run.await {
                Ok(outcome) => Ok(outcome),
                Err(e) if current < attempts => {
                    tracing::warn!(
                        job_id = %job.id,
                        family = %job.family,
                        attempt = current,
                        attempts,
                        error = %e,
                        "Job attempt failed, retrying"
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    }).await
}

/// Drains one family's queue, one job at a time.
pub struct JobWorker {
    family: JobFamily,
    receiver: mpsc::Receiver<Job>,
    processor: Arc<JobProcessor>,
    base_delay: Duration,
}

impl JobWorker {
    pub fn new(
        family: JobFamily,
        receiver: mpsc::Receiver<Job>,
        processor: Arc<JobProcessor>,
        base_delay: Duration
    ) -> Self {
        Self {
            family,
            receiver,
            processor,
            base_delay,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(family = %self.family, "Job worker started");

        while let Some(job) = self.receiver.recv().await {
            let processor = self.processor.clone();
            let result = run_with_retry(&job, self.base_delay, || {
                let processor = processor.clone();
                let job = job.clone();
                async move { processor.process(&job).await }
            }).await;

            match result {
                Ok(outcome) if outcome.skipped => {}
                Ok(outcome) => {
                    tracing::info!(
                        job_id = %job.id,
                        family = %job.family,
                        succeeded = outcome.succeeded,
                        failed = outcome.failed,
                        "Job completed"
                    );
                }
                Err(e) => self.report_failure(&job, &e).await,
            }
        }

        tracing::info!(family = %self.family, "Job queue closed, worker exiting");
    }

    async fn report_failure(&self, job: &Job, error: &AppError) {
        tracing::error!(
            job_id = %job.id,
            family = %job.family,
            attempts = job.attempts,
            code = error.classification(),
            error = %error,
            "Job failed after final attempt"
        );

        if self.processor.settings().system_settings().await.notify_on_error {
            tracing::error!(
                target: "notify",
                job_id = %job.id,
                family = %job.family,
                error = %error,
                "Scheduled job failed"
            );
        }
    }
}
