mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveTime;
use common::*;
use deposit_settler::enums::{ AssetKind, JobFamily };
use deposit_settler::jobs::{ job_queue, Job, JobProcessor, JobTarget };
use deposit_settler::reconfig::{ apply_settings_change, on_resubscribed, DEFAULT_SETTINGS_CHANNEL };
use deposit_settler::scheduler::Scheduler;
use deposit_settler::services::SettingsService;
use sea_orm::{ ActiveModelTrait, IntoActiveModel, Set };

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[tokio::test]
async fn gate_is_open_without_owner_and_closed_without_settings() {
    let db = setup_db().await;
    let settings = SettingsService::new(db.clone(), "admin");

    assert!(settings.is_active_at(at(3, 0)).await.unwrap());

    seed_user(&db, "admin").await;
    assert!(!settings.is_active_at(at(3, 0)).await.unwrap());
}

#[tokio::test]
async fn gate_follows_window_and_enabled_flag() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let row = seed_settings(&db, owner.id, true, 5, 15).await;

    let mut active = row.clone().into_active_model();
    active.start_time = Set("22:00".to_string());
    active.end_time = Set("06:00".to_string());
    let row = active.update(&db).await.unwrap();

    let settings = SettingsService::new(db.clone(), "admin");
    assert!(settings.is_active_at(at(23, 30)).await.unwrap());
    assert!(settings.is_active_at(at(6, 0)).await.unwrap());
    assert!(!settings.is_active_at(at(12, 0)).await.unwrap());

    let mut disabled = row.into_active_model();
    disabled.is_enabled = Set(false);
    disabled.update(&db).await.unwrap();
    assert!(!settings.is_active_at(at(23, 30)).await.unwrap());
}

#[tokio::test]
async fn disabled_settings_skip_jobs_without_touching_the_exchange() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    seed_settings(&db, owner.id, false, 5, 15).await;
    let credential = seed_credential(&db, owner.id, AssetKind::Base).await;
    let exchange = FakeExchange::with_deposits(
        vec![deposit(1, "1000", "2026-01-01T00:05:00Z")]
    );
    let services = services(&db, exchange.clone());
    let processor = JobProcessor::new(
        services.settings.clone(),
        services.settlement.clone(),
        services.balance_sync.clone()
    );

    let outcome = processor
        .process(&Job::new(JobFamily::DepositCheck, JobTarget::All, 3)).await
        .unwrap();

    assert!(outcome.skipped);
    assert_eq!(exchange.buy_count(), 0);
    assert!(ledger_entries(&db, credential.id).await.is_empty());
}

#[tokio::test]
async fn processor_fails_fan_out_when_a_credential_is_throttled() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    seed_settings(&db, owner.id, true, 5, 15).await;
    seed_credential(&db, owner.id, AssetKind::Base).await;
    let exchange = FakeExchange::with_deposits(vec![]);
    exchange.deposit_failures.lock().unwrap().push_back(rate_limited());
    let services = services(&db, exchange.clone());
    let processor = JobProcessor::new(
        services.settings.clone(),
        services.settlement.clone(),
        services.balance_sync.clone()
    );

    let job = Job::new(JobFamily::DepositCheck, JobTarget::All, 3);
    let result = processor.process(&job).await;
    assert!(matches!(result, Err(deposit_settler::AppError::RateLimited(_))));

    let retried = processor.process(&job).await.unwrap();
    assert_eq!(retried.succeeded, 1);
}

#[tokio::test]
async fn rebuild_installs_plan_from_settings_and_replaces_tasks() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let row = seed_settings(&db, owner.id, true, 2, 30).await;

    let settings = Arc::new(SettingsService::new(db.clone(), "admin"));
    let (deposit_queue, _deposit_jobs) = job_queue(JobFamily::DepositCheck, 8);
    let (balance_queue, _balance_jobs) = job_queue(JobFamily::BalanceSync, 8);
    let scheduler = Scheduler::new(settings, deposit_queue, balance_queue);

    assert!(scheduler.current_plan().await.is_none());

    let plan = scheduler.rebuild().await;
    assert_eq!(plan.deposit_check_every_secs, 120);
    assert_eq!(plan.balance_sync_every_secs, 1800);
    assert_eq!(plan.attempts, 4);
    assert_eq!(scheduler.recurring_task_count().await, 2);

    let again = scheduler.rebuild().await;
    assert_eq!(again, plan);
    assert_eq!(scheduler.recurring_task_count().await, 2);

    let mut changed = row.into_active_model();
    changed.deposit_check_interval = Set(10);
    changed.update(&db).await.unwrap();

    let updated = apply_settings_change(&scheduler, "{\"user_id\":1}").await;
    assert_eq!(updated.deposit_check_every_secs, 600);
    assert_eq!(scheduler.current_plan().await, Some(updated));

    scheduler.shutdown().await;
    assert_eq!(scheduler.recurring_task_count().await, 0);
}

#[tokio::test]
async fn resubscribe_picks_up_changes_missed_while_disconnected() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let row = seed_settings(&db, owner.id, true, 5, 15).await;

    let settings = Arc::new(SettingsService::new(db.clone(), "admin"));
    let (deposit_queue, _d) = job_queue(JobFamily::DepositCheck, 8);
    let (balance_queue, _b) = job_queue(JobFamily::BalanceSync, 8);
    let scheduler = Scheduler::new(settings, deposit_queue, balance_queue);
    scheduler.rebuild().await;

    // Changed while no subscription was open, so no message arrives
    let mut changed = row.into_active_model();
    changed.balance_sync_interval = Set(45);
    changed.retry_count = Set(2);
    changed.update(&db).await.unwrap();

    let plan = on_resubscribed(&scheduler, DEFAULT_SETTINGS_CHANNEL).await;

    assert_eq!(plan.balance_sync_every_secs, 2700);
    assert_eq!(plan.attempts, 2);
    assert_eq!(scheduler.current_plan().await, Some(plan));
    assert_eq!(scheduler.recurring_task_count().await, 2);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn rebuild_without_owner_uses_defaults() {
    let db = setup_db().await;
    let settings = Arc::new(SettingsService::new(db.clone(), "admin"));
    let (deposit_queue, _d) = job_queue(JobFamily::DepositCheck, 8);
    let (balance_queue, _b) = job_queue(JobFamily::BalanceSync, 8);
    let scheduler = Scheduler::new(settings, deposit_queue, balance_queue);

    let plan = scheduler.rebuild().await;

    assert_eq!(plan.deposit_check_every_secs, 300);
    assert_eq!(plan.balance_sync_every_secs, 900);
    assert_eq!(plan.attempts, 3);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn manual_enqueue_uses_installed_attempts() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    seed_settings(&db, owner.id, true, 5, 15).await;
    let settings = Arc::new(SettingsService::new(db.clone(), "admin"));
    let (deposit_queue, mut deposit_jobs) = job_queue(JobFamily::DepositCheck, 8);
    let (balance_queue, _b) = job_queue(JobFamily::BalanceSync, 8);
    let scheduler = Scheduler::new(settings, deposit_queue, balance_queue);
    scheduler.rebuild().await;

    let job = scheduler.enqueue(JobFamily::DepositCheck, JobTarget::Single(42)).await.unwrap();
    let received = tokio::time
        ::timeout(Duration::from_secs(1), deposit_jobs.recv()).await
        .unwrap()
        .unwrap();

    assert_eq!(received.id, job.id);
    assert_eq!(received.target, JobTarget::Single(42));
    assert_eq!(received.attempts, 4);
    scheduler.shutdown().await;
}
