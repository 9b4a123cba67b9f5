use chrono::Utc;
use sea_orm::{
    ActiveModelTrait,
    ColumnTrait,
    ConnectionTrait,
    EntityTrait,
    PaginatorTrait,
    QueryFilter,
    Set,
};

use crate::db::entity::{ api_key, transaction, Transaction };
use crate::enums::{ TxStatus, TxType };
use crate::error::{ AppError, Result };
use crate::exchange::{ Deposit, OrderFill, Withdrawal };

/// User and credential every ledger entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerOwner {
    pub user_id: i32,
    pub api_key_id: i32,
}

impl From<&api_key::Model> for LedgerOwner {
    fn from(credential: &api_key::Model) -> Self {
        Self {
            user_id: credential.user_id,
            api_key_id: credential.id,
        }
    }
}

/// A new ledger row. Entries are only ever inserted.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub owner: LedgerOwner,
    pub tx_type: TxType,
    pub status: TxStatus,
    pub deposit_id: Option<String>,
    pub deposit_amount: Option<String>,
    pub purchase_id: Option<String>,
    pub purchase_amount: Option<String>,
    pub purchase_rate: Option<String>,
    pub transfer_id: Option<String>,
    pub transfer_amount: Option<String>,
    pub wallet_address: Option<String>,
    pub error_message: Option<String>,
    pub raw_data: Option<serde_json::Value>,
}

impl LedgerEntry {
    fn new(owner: LedgerOwner, tx_type: TxType, status: TxStatus) -> Self {
        Self {
            owner,
            tx_type,
            status,
            deposit_id: None,
            deposit_amount: None,
            purchase_id: None,
            purchase_amount: None,
            purchase_rate: None,
            transfer_id: None,
            transfer_amount: None,
            wallet_address: None,
            error_message: None,
            raw_data: None,
        }
    }

    pub fn deposit(owner: LedgerOwner, deposit: &Deposit) -> Self {
        Self {
            deposit_id: Some(deposit.id.clone()),
            deposit_amount: Some(deposit.amount.to_string()),
            raw_data: Some(deposit.raw.clone()),
            ..Self::new(owner, TxType::Deposit, TxStatus::Completed)
        }
    }

    pub fn purchase(owner: LedgerOwner, tx_type: TxType, deposit_id: &str, fill: &OrderFill) -> Self {
        Self {
            deposit_id: Some(deposit_id.to_string()),
            purchase_id: Some(fill.id.clone()),
            purchase_amount: Some(fill.amount.to_string()),
            purchase_rate: fill.rate.map(|rate| rate.to_string()),
            raw_data: Some(fill.raw.clone()),
            ..Self::new(owner, tx_type, TxStatus::Completed)
        }
    }

    pub fn transfer(
        owner: LedgerOwner,
        tx_type: TxType,
        deposit_id: &str,
        withdrawal: &Withdrawal,
        wallet_address: &str
    ) -> Self {
        Self {
            deposit_id: Some(deposit_id.to_string()),
            transfer_id: Some(withdrawal.id.clone()),
            transfer_amount: Some(withdrawal.amount.to_string()),
            wallet_address: Some(wallet_address.to_string()),
            raw_data: Some(withdrawal.raw.clone()),
            ..Self::new(owner, tx_type, TxStatus::Completed)
        }
    }

    pub fn failure(owner: LedgerOwner, deposit_id: Option<&str>, error: &AppError) -> Self {
        Self {
            deposit_id: deposit_id.map(str::to_string),
            error_message: Some(error.to_string()),
            raw_data: Some(error.ledger_payload()),
            ..Self::new(owner, TxType::Error, TxStatus::Failed)
        }
    }
}

/// Append-only writer for the transaction ledger.
pub struct LedgerRepository;

impl LedgerRepository {
    pub async fn record<C: ConnectionTrait>(
        &self,
        conn: &C,
        entry: LedgerEntry
    ) -> Result<transaction::Model> {
        let now = Utc::now();

        let model = transaction::ActiveModel {
            user_id: Set(entry.owner.user_id),
            api_key_id: Set(entry.owner.api_key_id),
            tx_type: Set(entry.tx_type.to_string()),
            status: Set(entry.status.to_string()),
            deposit_id: Set(entry.deposit_id),
            deposit_amount: Set(entry.deposit_amount),
            purchase_id: Set(entry.purchase_id),
            purchase_amount: Set(entry.purchase_amount),
            purchase_rate: Set(entry.purchase_rate),
            transfer_id: Set(entry.transfer_id),
            transfer_amount: Set(entry.transfer_amount),
            wallet_address: Set(entry.wallet_address),
            error_message: Set(entry.error_message),
            raw_data: Set(entry.raw_data.map(|raw| raw.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let record = model.insert(conn).await?;
        Ok(record)
    }

    /// Whether this credential already has a deposit entry for the external id.
    pub async fn deposit_exists<C: ConnectionTrait>(
        &self,
        conn: &C,
        api_key_id: i32,
        deposit_id: &str
    ) -> Result<bool> {
        let count = Transaction::find()
            .filter(transaction::Column::ApiKeyId.eq(api_key_id))
            .filter(transaction::Column::TxType.eq(TxType::Deposit.as_str()))
            .filter(transaction::Column::DepositId.eq(deposit_id))
            .count(conn).await?;

        Ok(count > 0)
    }
}
