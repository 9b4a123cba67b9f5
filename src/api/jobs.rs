use axum::{ extract::{ Path, State }, http::StatusCode, Json };
use serde::Serialize;
use uuid::Uuid;

use crate::enums::JobFamily;
use crate::error::Result;
use crate::jobs::{ Job, JobTarget };
use crate::scheduler::SchedulePlan;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub family: JobFamily,
    pub target: JobTarget,
    pub attempts: u32,
}

impl From<Job> for JobAccepted {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            family: job.family,
            target: job.target,
            attempts: job.attempts,
        }
    }
}

async fn enqueue(
    state: &AppState,
    family: JobFamily,
    target: JobTarget
) -> Result<(StatusCode, Json<JobAccepted>)> {
    let job = state.scheduler.enqueue(family, target).await?;
    Ok((StatusCode::ACCEPTED, Json(job.into())))
}

pub async fn enqueue_deposit_check(
    State(state): State<AppState>
) -> Result<(StatusCode, Json<JobAccepted>)> {
    enqueue(&state, JobFamily::DepositCheck, JobTarget::All).await
}

pub async fn enqueue_deposit_check_single(
    State(state): State<AppState>,
    Path(api_key_id): Path<i32>
) -> Result<(StatusCode, Json<JobAccepted>)> {
    enqueue(&state, JobFamily::DepositCheck, JobTarget::Single(api_key_id)).await
}

pub async fn enqueue_balance_sync(
    State(state): State<AppState>
) -> Result<(StatusCode, Json<JobAccepted>)> {
    enqueue(&state, JobFamily::BalanceSync, JobTarget::All).await
}

pub async fn enqueue_balance_sync_single(
    State(state): State<AppState>,
    Path(api_key_id): Path<i32>
) -> Result<(StatusCode, Json<JobAccepted>)> {
    enqueue(&state, JobFamily::BalanceSync, JobTarget::Single(api_key_id)).await
}

pub async fn rebuild_schedule(State(state): State<AppState>) -> Json<SchedulePlan> {
    Json(state.scheduler.rebuild().await)
}
