use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::db::entity::api_key;
use crate::error::{ AppError, Result };

/// Result of one credential's pipeline run.
#[derive(Debug)]
pub struct CredentialOutcome<T> {
    pub api_key_id: i32,
    pub result: Result<T>,
}

/// Settle-all-then-report summary of a fan-out.
#[derive(Debug)]
pub struct FanOutReport<T> {
    pub outcomes: Vec<CredentialOutcome<T>>,
}

impl<T> FanOutReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn rate_limited(&self) -> Vec<i32> {
        self.outcomes
            .iter()
            .filter(|o| matches!(&o.result, Err(e) if e.is_rate_limited()))
            .map(|o| o.api_key_id)
            .collect()
    }
}

/// Run `work` once per credential with at most `max_concurrency` in flight.
///
/// Each run is its own task; an error or panic in one never stops the others.
pub async fn run_isolated<T, F, Fut>(
    credentials: Vec<api_key::Model>,
    max_concurrency: usize,
    work: F
) -> FanOutReport<T>
    where
        T: Send + 'static,
        F: Fn(api_key::Model) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for credential in credentials {
        let api_key_id = credential.id;
        let semaphore = semaphore.clone();
        let run = work(credential);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();

            let result = match tokio::spawn(run).await {
                Ok(result) => result,
                Err(e) => Err(AppError::Internal(format!("credential task aborted: {}", e))),
            };

            CredentialOutcome { api_key_id, result }
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => tracing::error!(error = %e, "Fan-out supervisor task failed"),
        }
    }

    outcomes.sort_by_key(|o| o.api_key_id);
    FanOutReport { outcomes }
}
