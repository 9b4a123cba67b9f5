use std::sync::Arc;

use chrono::{ DateTime, Duration, Utc };
use sea_orm::{ DatabaseConnection, DatabaseTransaction, TransactionTrait };
use serde::Serialize;

use crate::crypto::{ CredentialVault, UnlockedCredential };
use crate::db::entity::api_key;
use crate::db::{ CredentialRepository, LedgerEntry, LedgerOwner, LedgerRepository };
use crate::error::{ AppError, Result };
use crate::exchange::{ AssetStrategy, Deposit, ExchangeApi };

use super::fanout::{ run_isolated, FanOutReport };

/// What one settlement run did for a credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementSummary {
    pub api_key_id: i32,
    /// Confirmed deposits newer than the cursor.
    pub observed: usize,
    pub settled: usize,
    pub failed: usize,
    pub duplicates: usize,
    pub deposit_cursor: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// Deposits confirmed at or before this instant never qualify. Rows that predate
/// the cursor column fall back to `last_checked_at`.
pub(crate) fn deposit_floor(credential: &api_key::Model) -> Option<DateTime<Utc>> {
    credential.deposit_cursor_at.or(credential.last_checked_at)
}

enum Forwarded {
    Settled,
    Failed {
        submitted: bool,
    },
    Throttled {
        submitted: bool,
        error: AppError,
    },
}

/// Deposit-to-wallet pipeline: record each new fiat deposit, buy the
/// credential's asset with it and withdraw the purchase to the owner's wallet.
pub struct SettlementService {
    db: DatabaseConnection,
    credentials: Arc<CredentialRepository>,
    ledger: Arc<LedgerRepository>,
    vault: Arc<CredentialVault>,
    exchange: Arc<dyn ExchangeApi>,
    fiat_currency: String,
    max_concurrency: usize,
}

impl SettlementService {
    pub fn new(
        db: DatabaseConnection,
        credentials: Arc<CredentialRepository>,
        ledger: Arc<LedgerRepository>,
        vault: Arc<CredentialVault>,
        exchange: Arc<dyn ExchangeApi>,
        fiat_currency: impl Into<String>,
        max_concurrency: usize
    ) -> Self {
        Self {
            db,
            credentials,
            ledger,
            vault,
            exchange,
            fiat_currency: fiat_currency.into(),
            max_concurrency,
        }
    }

    /// Settle every active credential. One credential failing never stops the rest.
    pub async fn check_all(self: &Arc<Self>) -> Result<FanOutReport<SettlementSummary>> {
        let credentials = self.credentials.find_active().await?;
        tracing::info!(count = credentials.len(), "Checking deposits for active credentials");

        let report = run_isolated(credentials, self.max_concurrency, |credential| {
            let service = self.clone();
            async move { service.settle(&credential).await }
        }).await;

        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            rate_limited = ?report.rate_limited(),
            "Deposit check finished"
        );

        Ok(report)
    }

    /// Settle one credential. `None` when it does not exist or is inactive.
    pub async fn check_single(&self, api_key_id: i32) -> Result<Option<SettlementSummary>> {
        let Some(credential) = self.credentials.find_active_by_id(api_key_id).await? else {
            tracing::warn!(api_key_id, "Credential missing or inactive, skipping deposit check");
            return Ok(None);
        };

        self.settle(&credential).await.map(Some)
    }

    pub async fn settle(&self, credential: &api_key::Model) -> Result<SettlementSummary> {
        let owner = LedgerOwner::from(credential);

        // Decrypt credential
        let unlocked = match self.vault.unlock(credential) {
            Ok(unlocked) => unlocked,
            Err(e) => {
                tracing::error!(api_key_id = credential.id, error = %e, "Cannot unlock credential");
                if let Err(record_err) = self.ledger.record(&self.db, LedgerEntry::failure(owner, None, &e)).await {
                    tracing::error!(api_key_id = credential.id, error = %record_err, "Failed to record credential error");
                }
                return Err(e);
            }
        };

        let strategy = AssetStrategy::select(self.exchange.clone(), &unlocked);
        let txn = self.db.begin().await?;

        match self.settle_in(&txn, credential, &unlocked, &strategy).await {
            Ok((summary, throttled)) => {
                txn.commit().await?;
                tracing::info!(
                    api_key_id = credential.id,
                    observed = summary.observed,
                    settled = summary.settled,
                    failed = summary.failed,
                    duplicates = summary.duplicates,
                    "Deposit check committed"
                );

                match throttled {
                    Some(error) => Err(error),
                    None => Ok(summary),
                }
            }
            Err(e) => {
                tracing::error!(api_key_id = credential.id, error = %e, "Deposit check rolled back");
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Runs inside the credential's transaction. Returns the summary and, when
    /// the exchange throttled after something was already submitted, the error
    /// to surface once the partial batch is committed.
    async fn settle_in(
        &self,
        txn: &DatabaseTransaction,
        credential: &api_key::Model,
        unlocked: &UnlockedCredential,
        strategy: &AssetStrategy
    ) -> Result<(SettlementSummary, Option<AppError>)> {
        let owner = LedgerOwner::from(credential);
        let started_at = Utc::now();
        let floor = deposit_floor(credential);

        // Fetch deposits confirmed since the floor
        let mut pending: Vec<Deposit> = self.exchange
            .get_deposits(&unlocked.keys, &self.fiat_currency, floor).await?
            .into_iter()
            .filter(|deposit| deposit.is_confirmed_after(floor))
            .collect();
        pending.sort_by_key(|deposit| deposit.confirmed_at);

        tracing::info!(
            api_key_id = credential.id,
            asset = %strategy.asset(),
            count = pending.len(),
            "Found new confirmed deposits"
        );

        let mut summary = SettlementSummary {
            api_key_id: credential.id,
            observed: pending.len(),
            ..Default::default()
        };
        let mut watermark = floor;
        let mut submitted_any = false;
        let mut throttled = None;
        let mut stopped_at = None;

        for (index, deposit) in pending.iter().enumerate() {
            if self.ledger.deposit_exists(txn, credential.id, &deposit.id).await? {
                tracing::debug!(api_key_id = credential.id, deposit_id = %deposit.id, "Deposit already recorded");
                summary.duplicates += 1;
                watermark = watermark.max(deposit.confirmed_at);
                continue;
            }

            let savepoint = txn.begin().await?;
            self.ledger.record(&savepoint, LedgerEntry::deposit(owner, deposit)).await?;

            match self.forward(&savepoint, owner, deposit, unlocked, strategy).await? {
                Forwarded::Settled => {
                    savepoint.commit().await?;
                    submitted_any = true;
                    summary.settled += 1;
                }
                Forwarded::Failed { submitted } => {
                    savepoint.commit().await?;
                    submitted_any |= submitted;
                    summary.failed += 1;
                }
                Forwarded::Throttled { submitted: false, error } => {
                    savepoint.rollback().await?;
                    if !submitted_any {
                        return Err(error);
                    }
                    tracing::warn!(api_key_id = credential.id, deposit_id = %deposit.id, "Rate limited, stopping batch");
                    throttled = Some(error);
                    stopped_at = Some(index);
                    break;
                }
                Forwarded::Throttled { submitted: true, error } => {
                    savepoint.commit().await?;
                    summary.failed += 1;
                    watermark = watermark.max(deposit.confirmed_at);
                    tracing::warn!(api_key_id = credential.id, deposit_id = %deposit.id, "Rate limited, stopping batch");
                    throttled = Some(error);
                    stopped_at = Some(index + 1);
                    break;
                }
            }

            watermark = watermark.max(deposit.confirmed_at);
        }

        // Deposits left behind must stay strictly after the cursor
        if let Some(next) = stopped_at.and_then(|i| pending.get(i)).and_then(|d| d.confirmed_at) {
            if watermark.is_some_and(|w| w >= next) {
                watermark = Some(next - Duration::microseconds(1));
            }
        }

        // A checked credential always carries a cursor, so later moves of
        // last_checked_at never shift the gate.
        let watermark = watermark.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let checked_at = credential.last_checked_at.map_or(started_at, |prev| prev.max(started_at));
        self.credentials.mark_checked(txn, credential.id, checked_at, watermark).await?;

        summary.deposit_cursor = Some(watermark);
        summary.last_checked_at = Some(checked_at);

        Ok((summary, throttled))
    }

    /// Buy with the deposit and withdraw the purchase. Only persistence errors
    /// escape; exchange failures become error entries.
    async fn forward(
        &self,
        conn: &DatabaseTransaction,
        owner: LedgerOwner,
        deposit: &Deposit,
        unlocked: &UnlockedCredential,
        strategy: &AssetStrategy
    ) -> Result<Forwarded> {
        let fill = match strategy.buy(deposit.amount).await {
            Ok(fill) => fill,
            Err(e) if e.is_rate_limited() => {
                return Ok(Forwarded::Throttled { submitted: false, error: e });
            }
            Err(e) => {
                tracing::error!(deposit_id = %deposit.id, error = %e, "Market buy failed");
                self.ledger.record(conn, LedgerEntry::failure(owner, Some(&deposit.id), &e)).await?;
                return Ok(Forwarded::Failed { submitted: false });
            }
        };

        tracing::info!(deposit_id = %deposit.id, order_id = %fill.id, amount = %fill.amount, "Market buy filled");
        self.ledger.record(
            conn,
            LedgerEntry::purchase(owner, strategy.purchase_type(), &deposit.id, &fill)
        ).await?;

        match strategy.withdraw(&unlocked.wallet_address, fill.amount).await {
            Ok(withdrawal) => {
                tracing::info!(deposit_id = %deposit.id, transfer_id = %withdrawal.id, "Withdrawal requested");
                self.ledger.record(
                    conn,
                    LedgerEntry::transfer(
                        owner,
                        strategy.transfer_type(),
                        &deposit.id,
                        &withdrawal,
                        &unlocked.wallet_address
                    )
                ).await?;
                Ok(Forwarded::Settled)
            }
            Err(e) => {
                tracing::error!(
                    deposit_id = %deposit.id,
                    amount = %fill.amount,
                    error = %e,
                    "Withdrawal failed, purchased asset left on exchange account; operator intervention required"
                );
                self.ledger.record(conn, LedgerEntry::failure(owner, Some(&deposit.id), &e)).await?;

                if e.is_rate_limited() {
                    Ok(Forwarded::Throttled { submitted: true, error: e })
                } else {
                    Ok(Forwarded::Failed { submitted: true })
                }
            }
        }
    }
}
