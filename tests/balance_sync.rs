mod common;

use std::str::FromStr;

use chrono::{ DateTime, Utc };
use common::*;
use deposit_settler::enums::AssetKind;
use deposit_settler::exchange::BalanceSnapshot;
use deposit_settler::AppError;
use sea_orm::prelude::Decimal;
use serde_json::json;

fn snapshot(jpy: &str, btc: &str) -> BalanceSnapshot {
    BalanceSnapshot::from_json(&json!({ "jpy": jpy, "btc": btc, "eth": "0", "btc_reserved": "0.1" })).unwrap()
}

#[tokio::test]
async fn sync_overwrites_single_balance_row() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let credential = seed_credential(&db, owner.id, AssetKind::Base).await;
    let exchange = FakeExchange::with_deposits(vec![]);
    let services = services(&db, exchange.clone());

    *exchange.balance.lock().unwrap() = Some(snapshot("1000", "0.5"));
    services.balance_sync.sync_single(credential.id).await.unwrap().unwrap();

    *exchange.balance.lock().unwrap() = Some(snapshot("250", "0.75"));
    let summary = services.balance_sync.sync_single(credential.id).await.unwrap().unwrap();

    let row = balance_row(&db, credential.id).await.unwrap();
    assert_eq!(Decimal::from_str(&row.jpy).unwrap(), Decimal::from(250));
    assert_eq!(Decimal::from_str(&row.btc).unwrap(), Decimal::from_str("0.75").unwrap());
    assert_eq!(Decimal::from_str(&row.btc_reserved).unwrap(), Decimal::from_str("0.1").unwrap());
    assert_eq!(Decimal::from_str(&row.eth_reserved).unwrap(), Decimal::ZERO);

    let stored = credential_row(&db, credential.id).await;
    assert_eq!(stored.last_checked_at, Some(summary.checked_at));
}

#[tokio::test]
async fn sync_before_first_settlement_keeps_deposits_eligible() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let credential = seed_credential(&db, owner.id, AssetKind::Base).await;
    let exchange = FakeExchange::with_deposits(
        vec![deposit(1, "1000", "2026-01-01T00:05:00Z")]
    );
    *exchange.balance.lock().unwrap() = Some(snapshot("0", "0"));
    let services = services(&db, exchange.clone());

    services.balance_sync.sync_single(credential.id).await.unwrap();
    let stored = credential_row(&db, credential.id).await;
    assert!(stored.last_checked_at.is_some());
    assert_eq!(stored.deposit_cursor_at, Some(DateTime::<Utc>::UNIX_EPOCH));

    // A deposit confirmed before the balance sync still settles
    let summary = services.settlement.check_single(credential.id).await.unwrap().unwrap();
    assert_eq!(summary.settled, 1);
}

#[tokio::test]
async fn sync_after_settlement_keeps_cursor() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let credential = seed_credential(&db, owner.id, AssetKind::Base).await;
    let exchange = FakeExchange::with_deposits(
        vec![deposit(1, "1000", "2026-01-01T00:05:00Z")]
    );
    *exchange.balance.lock().unwrap() = Some(snapshot("0", "0"));
    let services = services(&db, exchange.clone());

    services.settlement.check_single(credential.id).await.unwrap();
    services.balance_sync.sync_single(credential.id).await.unwrap();

    let cursor = credential_row(&db, credential.id).await.deposit_cursor_at;
    assert_eq!(cursor, Some(DateTime::parse_from_rfc3339("2026-01-01T00:05:00Z").unwrap().with_timezone(&Utc)));
}

#[tokio::test]
async fn failed_fetch_writes_nothing() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let credential = seed_credential(&db, owner.id, AssetKind::Base).await;
    let services = services(&db, FakeExchange::with_deposits(vec![]));

    let result = services.balance_sync.sync_single(credential.id).await;

    assert!(matches!(result, Err(AppError::ExchangeApi { .. })));
    assert!(balance_row(&db, credential.id).await.is_none());
    assert_eq!(credential_row(&db, credential.id).await.last_checked_at, None);
}

#[tokio::test]
async fn sync_all_reports_each_credential() {
    let db = setup_db().await;
    let owner = seed_user(&db, "admin").await;
    let first = seed_credential(&db, owner.id, AssetKind::Base).await;
    let second = seed_credential(&db, owner.id, AssetKind::Alt).await;
    let exchange = FakeExchange::with_deposits(vec![]);
    *exchange.balance.lock().unwrap() = Some(snapshot("10", "0"));
    let services = services(&db, exchange.clone());

    let report = services.balance_sync.sync_all().await.unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(exchange.balance_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert!(balance_row(&db, first.id).await.is_some());
    assert!(balance_row(&db, second.id).await.is_some());
}
