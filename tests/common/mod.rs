#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex };

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use deposit_settler::crypto::{ CredentialVault, Encryptor };
use deposit_settler::db::entity::{ api_key, balance, sync_setting, transaction, user };
use deposit_settler::db::{ BalanceRepository, CredentialRepository, LedgerRepository };
use deposit_settler::enums::AssetKind;
use deposit_settler::exchange::{
    BalanceSnapshot,
    Deposit,
    ExchangeApi,
    ExchangeKeys,
    OrderFill,
    Withdrawal,
};
use deposit_settler::services::{ BalanceSyncService, SettingsService, SettlementService };
use deposit_settler::{ AppError, Result };
use migration::MigratorTrait;
use sea_orm::prelude::Decimal;
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    ConnectOptions,
    Database,
    DatabaseConnection,
    EntityTrait,
    QueryFilter,
    QueryOrder,
    Set,
};
use serde_json::json;

pub const TEST_KEY: [u8; 32] = [7u8; 32];
pub const BTC_ADDRESS: &str = "bc1qtestaddress";

pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    db
}

pub fn encryptor() -> Arc<Encryptor> {
    Arc::new(Encryptor::new(&TEST_KEY).unwrap())
}

pub async fn seed_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(None),
        role: Set("admin".to_string()),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
        .insert(db).await
        .unwrap()
}

pub async fn seed_credential(
    db: &DatabaseConnection,
    user_id: i32,
    asset: AssetKind
) -> api_key::Model {
    let encryptor = encryptor();
    let address = encryptor.encrypt(BTC_ADDRESS).unwrap();

    let (btc, eth) = match asset {
        AssetKind::Base => (Some(address), None),
        AssetKind::Alt => (None, Some(address)),
    };

    api_key::ActiveModel {
        user_id: Set(user_id),
        name: Set("primary".to_string()),
        access_key: Set(encryptor.encrypt("access").unwrap()),
        secret_key: Set(encryptor.encrypt("secret").unwrap()),
        btc_wallet_address: Set(btc),
        eth_wallet_address: Set(eth),
        cryptocurrency_type: Set(asset.as_str().to_string()),
        is_active: Set(true),
        last_checked_at: Set(None),
        deposit_cursor_at: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
        .insert(db).await
        .unwrap()
}

pub async fn seed_settings(
    db: &DatabaseConnection,
    user_id: i32,
    enabled: bool,
    deposit_minutes: i32,
    balance_minutes: i32
) -> sync_setting::Model {
    sync_setting::ActiveModel {
        user_id: Set(user_id),
        is_enabled: Set(enabled),
        balance_sync_interval: Set(balance_minutes),
        deposit_check_interval: Set(deposit_minutes),
        start_time: Set("00:00".to_string()),
        end_time: Set("23:59".to_string()),
        retry_count: Set(4),
        notify_on_error: Set(false),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
        .insert(db).await
        .unwrap()
}

pub async fn credential_row(db: &DatabaseConnection, id: i32) -> api_key::Model {
    api_key::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub async fn ledger_entries(db: &DatabaseConnection, api_key_id: i32) -> Vec<transaction::Model> {
    transaction::Entity
        ::find()
        .filter(transaction::Column::ApiKeyId.eq(api_key_id))
        .order_by_asc(transaction::Column::Id)
        .all(db).await
        .unwrap()
}

pub async fn balance_row(db: &DatabaseConnection, api_key_id: i32) -> Option<balance::Model> {
    balance::Entity
        ::find()
        .filter(balance::Column::ApiKeyId.eq(api_key_id))
        .one(db).await
        .unwrap()
}

pub fn deposit(id: u64, amount: &str, confirmed_at: &str) -> Deposit {
    Deposit::from_json(
        &json!({
            "id": id,
            "amount": amount,
            "status": "confirmed",
            "confirmed_at": confirmed_at,
        })
    ).unwrap()
}

pub fn rate_limited() -> AppError {
    AppError::RateLimited("HTTP 429".to_string())
}

/// Scripted exchange. Buys and withdrawals succeed unless a failure is queued.
#[derive(Default)]
pub struct FakeExchange {
    pub deposits: Mutex<Vec<Deposit>>,
    pub deposit_failures: Mutex<VecDeque<AppError>>,
    pub buy_failures: Mutex<VecDeque<Option<AppError>>>,
    pub withdraw_failures: Mutex<VecDeque<Option<AppError>>>,
    pub balance: Mutex<Option<BalanceSnapshot>>,
    pub buys: AtomicUsize,
    pub withdrawals: AtomicUsize,
    pub balance_calls: AtomicUsize,
}

impl FakeExchange {
    pub fn with_deposits(deposits: Vec<Deposit>) -> Arc<Self> {
        let fake = Self::default();
        *fake.deposits.lock().unwrap() = deposits;
        Arc::new(fake)
    }

    pub fn fail_next_buy(&self, error: Option<AppError>) {
        self.buy_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_withdraw(&self, error: Option<AppError>) {
        self.withdraw_failures.lock().unwrap().push_back(error);
    }

    pub fn buy_count(&self) -> usize {
        self.buys.load(Ordering::SeqCst)
    }

    pub fn withdraw_count(&self) -> usize {
        self.withdrawals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeApi for FakeExchange {
    async fn get_balance(&self, _keys: &ExchangeKeys) -> Result<BalanceSnapshot> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.balance
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::exchange("no balance scripted"))
    }

    async fn get_deposits(
        &self,
        _keys: &ExchangeKeys,
        _currency: &str,
        _confirmed_after: Option<DateTime<Utc>>
    ) -> Result<Vec<Deposit>> {
        if let Some(error) = self.deposit_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.deposits.lock().unwrap().clone())
    }

    async fn market_buy(
        &self,
        _keys: &ExchangeKeys,
        _pair: &str,
        fiat_amount: Decimal
    ) -> Result<OrderFill> {
        if let Some(Some(error)) = self.buy_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let n = self.buys.fetch_add(1, Ordering::SeqCst) + 1;
        OrderFill::from_json(
            &json!({
                "id": 9000 + n,
                "rate": "5000000",
                "market_buy_amount": fiat_amount.to_string(),
            })
        )
    }

    async fn withdraw(
        &self,
        _keys: &ExchangeKeys,
        _asset: AssetKind,
        address: &str,
        amount: Decimal
    ) -> Result<Withdrawal> {
        if let Some(Some(error)) = self.withdraw_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let n = self.withdrawals.fetch_add(1, Ordering::SeqCst) + 1;
        Withdrawal::from_json(&json!({ "id": 7000 + n, "address": address }), amount)
    }
}

pub struct Services {
    pub settlement: Arc<SettlementService>,
    pub balance_sync: Arc<BalanceSyncService>,
    pub settings: Arc<SettingsService>,
}

pub fn services(db: &DatabaseConnection, exchange: Arc<FakeExchange>) -> Services {
    let vault = Arc::new(CredentialVault::new(encryptor()));
    let credentials = Arc::new(CredentialRepository::new(db.clone()));
    let ledger = Arc::new(LedgerRepository);
    let balances = Arc::new(BalanceRepository);
    let exchange: Arc<dyn ExchangeApi> = exchange;

    Services {
        settlement: Arc::new(
            SettlementService::new(
                db.clone(),
                credentials.clone(),
                ledger,
                vault.clone(),
                exchange.clone(),
                "JPY",
                4
            )
        ),
        balance_sync: Arc::new(
            BalanceSyncService::new(
                db.clone(),
                credentials,
                balances,
                vault,
                exchange,
                4
            )
        ),
        settings: Arc::new(SettingsService::new(db.clone(), "admin")),
    }
}
