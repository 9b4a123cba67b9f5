use std::sync::Arc;

use chrono::{ DateTime, Utc };
use sea_orm::{ DatabaseConnection, TransactionTrait };
use serde::Serialize;

use crate::crypto::CredentialVault;
use crate::db::entity::api_key;
use crate::db::{ BalanceRepository, CredentialRepository };
use crate::error::Result;
use crate::exchange::ExchangeApi;

use super::fanout::{ run_isolated, FanOutReport };
use super::settlement_service::deposit_floor;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSyncSummary {
    pub api_key_id: i32,
    pub checked_at: DateTime<Utc>,
}

/// Mirrors each credential's exchange balance into the local cache.
pub struct BalanceSyncService {
    db: DatabaseConnection,
    credentials: Arc<CredentialRepository>,
    balances: Arc<BalanceRepository>,
    vault: Arc<CredentialVault>,
    exchange: Arc<dyn ExchangeApi>,
    max_concurrency: usize,
}

impl BalanceSyncService {
    pub fn new(
        db: DatabaseConnection,
        credentials: Arc<CredentialRepository>,
        balances: Arc<BalanceRepository>,
        vault: Arc<CredentialVault>,
        exchange: Arc<dyn ExchangeApi>,
        max_concurrency: usize
    ) -> Self {
        Self {
            db,
            credentials,
            balances,
            vault,
            exchange,
            max_concurrency,
        }
    }

    pub async fn sync_all(self: &Arc<Self>) -> Result<FanOutReport<BalanceSyncSummary>> {
        let credentials = self.credentials.find_active().await?;
        tracing::info!(count = credentials.len(), "Syncing balances for active credentials");

        let report = run_isolated(credentials, self.max_concurrency, |credential| {
            let service = self.clone();
            async move { service.sync(&credential).await }
        }).await;

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            rate_limited = ?report.rate_limited(),
            "Balance sync finished"
        );

        Ok(report)
    }

    pub async fn sync_single(&self, api_key_id: i32) -> Result<Option<BalanceSyncSummary>> {
        let Some(credential) = self.credentials.find_active_by_id(api_key_id).await? else {
            tracing::warn!(api_key_id, "Credential missing or inactive, skipping balance sync");
            return Ok(None);
        };

        self.sync(&credential).await.map(Some)
    }

    pub async fn sync(&self, credential: &api_key::Model) -> Result<BalanceSyncSummary> {
        let keys = self.vault.open_keys(credential)?;
        let snapshot = self.exchange.get_balance(&keys).await?;

        let now = Utc::now();
        let checked_at = credential.last_checked_at.map_or(now, |prev| prev.max(now));

        let cursor_seed = deposit_floor(credential).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        // Balance row and credential timestamps move together
        let txn = self.db.begin().await?;
        let written = async {
            self.balances.upsert(&txn, credential.id, &snapshot, checked_at).await?;
            self.credentials.mark_balance_checked(&txn, credential.id, checked_at, cursor_seed).await
        }.await;

        if let Err(e) = written {
            tracing::error!(api_key_id = credential.id, error = %e, "Balance sync rolled back");
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            return Err(e);
        }
        txn.commit().await?;

        tracing::debug!(
            api_key_id = credential.id,
            jpy = %snapshot.jpy,
            btc = %snapshot.btc,
            eth = %snapshot.eth,
            "Balance synced"
        );

        Ok(BalanceSyncSummary {
            api_key_id: credential.id,
            checked_at,
        })
    }
}
