use std::sync::Arc;

use axum::{ extract::State, routing::{ get, post }, Json, Router };
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub mod jobs;

use crate::scheduler::{ SchedulePlan, Scheduler };

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/jobs/deposit-check", post(jobs::enqueue_deposit_check))
        .route("/jobs/deposit-check/{id}", post(jobs::enqueue_deposit_check_single))
        .route("/jobs/balance-sync", post(jobs::enqueue_balance_sync))
        .route("/jobs/balance-sync/{id}", post(jobs::enqueue_balance_sync_single))
        .route("/scheduler/rebuild", post(jobs::rebuild_schedule))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    /// Live recurring tickers; 0 means nothing will run on its own.
    pub recurring_tasks: usize,
    pub plan: Option<SchedulePlan>,
}

async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        recurring_tasks: state.scheduler.recurring_task_count().await,
        plan: state.scheduler.current_plan().await,
    })
}
