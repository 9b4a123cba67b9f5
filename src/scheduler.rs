use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{ interval_at, Instant, MissedTickBehavior };

use crate::enums::JobFamily;
use crate::error::Result;
use crate::jobs::{ Job, JobQueue, JobTarget };
use crate::services::SettingsService;

/// Cadence and retry policy currently installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulePlan {
    pub deposit_check_every_secs: u64,
    pub balance_sync_every_secs: u64,
    pub attempts: u32,
}

struct Installed {
    plan: SchedulePlan,
    tickers: Vec<JoinHandle<()>>,
}

/// Owns the recurring tickers that feed the job queues.
///
/// Rebuilding replaces only the tickers. Workers and the jobs they are
/// running are untouched, so in-flight work is never cancelled.
pub struct Scheduler {
    settings: Arc<SettingsService>,
    deposit_queue: JobQueue,
    balance_queue: JobQueue,
    installed: Mutex<Option<Installed>>,
}

impl Scheduler {
    pub fn new(
        settings: Arc<SettingsService>,
        deposit_queue: JobQueue,
        balance_queue: JobQueue
    ) -> Self {
        Self {
            settings,
            deposit_queue,
            balance_queue,
            installed: Mutex::new(None),
        }
    }

    /// Remove every recurring task and install fresh ones from current settings.
    pub async fn rebuild(&self) -> SchedulePlan {
        let mut installed = self.installed.lock().await;

        if let Some(previous) = installed.take() {
            for ticker in previous.tickers {
                ticker.abort();
            }
        }

        let settings = self.settings.system_settings().await;
        let plan = SchedulePlan {
            deposit_check_every_secs: settings.deposit_check_interval.as_secs(),
            balance_sync_every_secs: settings.balance_sync_interval.as_secs(),
            attempts: settings.retry_count,
        };

        let tickers = vec![
            spawn_recurring(self.deposit_queue.clone(), settings.deposit_check_interval, plan.attempts),
            spawn_recurring(self.balance_queue.clone(), settings.balance_sync_interval, plan.attempts)
        ];

        tracing::info!(
            deposit_check_every_secs = plan.deposit_check_every_secs,
            balance_sync_every_secs = plan.balance_sync_every_secs,
            attempts = plan.attempts,
            enabled = settings.is_enabled,
            "Recurring jobs scheduled"
        );

        *installed = Some(Installed { plan, tickers });
        plan
    }

    pub async fn current_plan(&self) -> Option<SchedulePlan> {
        self.installed.lock().await.as_ref().map(|installed| installed.plan)
    }

    /// Number of recurring tasks currently installed.
    pub async fn recurring_task_count(&self) -> usize {
        self.installed
            .lock().await
            .as_ref()
            .map_or(0, |installed| installed.tickers.iter().filter(|t| !t.is_finished()).count())
    }

    /// Queue an immediate run using the installed retry policy.
    pub async fn enqueue(&self, family: JobFamily, target: JobTarget) -> Result<Job> {
        let attempts = match self.current_plan().await {
            Some(plan) => plan.attempts,
            None => self.settings.system_settings().await.retry_count,
        };

        let queue = match family {
            JobFamily::DepositCheck => &self.deposit_queue,
            JobFamily::BalanceSync => &self.balance_queue,
        };

        let job = queue.try_enqueue(target, attempts)?;
        tracing::info!(job_id = %job.id, family = %family, target = ?target, "Job enqueued");
        Ok(job)
    }

    pub async fn shutdown(&self) {
        if let Some(installed) = self.installed.lock().await.take() {
            for ticker in installed.tickers {
                ticker.abort();
            }
        }
    }
}

/// Enqueue a fan-out job every `every`, first tick one period from now.
/// A tick that finds the queue full is dropped.
pub fn spawn_recurring(queue: JobQueue, every: Duration, attempts: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match queue.try_enqueue(JobTarget::All, attempts) {
                Ok(job) => {
                    tracing::debug!(job_id = %job.id, family = %queue.family(), "Recurring job enqueued");
                }
                Err(e) => {
                    tracing::warn!(family = %queue.family(), error = %e, "Dropped recurring tick");
                }
            }
        }
    })
}
