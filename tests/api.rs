mod common;

use std::sync::Arc;

use axum::body::{ to_bytes, Body };
use axum::http::{ Request, StatusCode };
use common::*;
use deposit_settler::api::{ router, AppState };
use deposit_settler::enums::JobFamily;
use deposit_settler::jobs::job_queue;
use deposit_settler::scheduler::Scheduler;
use deposit_settler::services::SettingsService;
use serde_json::Value;
use tower::ServiceExt;

async fn call(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()).await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn post(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    call(app, "POST", uri).await
}

#[tokio::test]
async fn health_reports_installed_schedule() {
    let db = setup_db().await;
    let settings = Arc::new(SettingsService::new(db.clone(), "admin"));
    let (deposit_queue, _d) = job_queue(JobFamily::DepositCheck, 8);
    let (balance_queue, _b) = job_queue(JobFamily::BalanceSync, 8);
    let scheduler = Arc::new(Scheduler::new(settings, deposit_queue, balance_queue));
    let app = router(AppState::new(scheduler.clone()));

    let (status, body) = call(app.clone(), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["recurring_tasks"], 0);
    assert!(body["plan"].is_null());

    scheduler.rebuild().await;
    let (_, body) = call(app, "GET", "/health").await;
    assert_eq!(body["recurring_tasks"], 2);
    assert_eq!(body["plan"]["balance_sync_every_secs"], 900);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn job_routes_accept_and_enqueue() {
    let db = setup_db().await;
    let settings = Arc::new(SettingsService::new(db.clone(), "admin"));
    let (deposit_queue, mut deposit_jobs) = job_queue(JobFamily::DepositCheck, 8);
    let (balance_queue, mut balance_jobs) = job_queue(JobFamily::BalanceSync, 8);
    let scheduler = Arc::new(Scheduler::new(settings, deposit_queue, balance_queue));
    let app = router(AppState::new(scheduler.clone()));

    let (status, body) = post(app.clone(), "/jobs/deposit-check/12").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["family"], "deposit_check");
    assert_eq!(body["target"]["single"], 12);

    let queued = deposit_jobs.try_recv().unwrap();
    assert_eq!(queued.id.to_string(), body["job_id"].as_str().unwrap());

    let (status, body) = post(app.clone(), "/jobs/balance-sync").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["target"], "all");
    assert!(balance_jobs.try_recv().is_ok());

    let (status, body) = post(app, "/scheduler/rebuild").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deposit_check_every_secs"], 300);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn full_queue_returns_service_unavailable() {
    let db = setup_db().await;
    let settings = Arc::new(SettingsService::new(db.clone(), "admin"));
    let (deposit_queue, _deposit_jobs) = job_queue(JobFamily::DepositCheck, 1);
    let (balance_queue, _balance_jobs) = job_queue(JobFamily::BalanceSync, 1);
    let scheduler = Arc::new(Scheduler::new(settings, deposit_queue, balance_queue));
    let app = router(AppState::new(scheduler));

    let (first, _) = post(app.clone(), "/jobs/deposit-check").await;
    let (second, body) = post(app, "/jobs/deposit-check").await;

    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(second, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "QUEUE_FULL");
}
