//! Signed REST client for the custodial exchange.

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use sea_orm::prelude::Decimal;

use crate::enums::AssetKind;
use crate::error::Result;

mod client;
mod models;
mod signer;
mod strategy;

pub use client::{ classify_response, CoincheckClient, DEFAULT_BASE_URL };
pub use models::{ BalanceSnapshot, Deposit, OrderFill, Withdrawal };
pub use signer::{ sign_request, ExchangeKeys };
pub use strategy::AssetStrategy;

/// Operations the settlement worker consumes from the exchange.
///
/// Implementations must report HTTP 429 as `AppError::RateLimited` and every
/// other failure as `AppError::ExchangeApi`.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Current account balance.
    async fn get_balance(&self, keys: &ExchangeKeys) -> Result<BalanceSnapshot>;

    /// Deposit history filtered by currency. Implementations may drop entries
    /// confirmed at or before `confirmed_after`; callers still gate on it.
    async fn get_deposits(
        &self,
        keys: &ExchangeKeys,
        currency: &str,
        confirmed_after: Option<DateTime<Utc>>
    ) -> Result<Vec<Deposit>>;

    /// Market buy spending `fiat_amount` on `pair`.
    async fn market_buy(
        &self,
        keys: &ExchangeKeys,
        pair: &str,
        fiat_amount: Decimal
    ) -> Result<OrderFill>;

    /// Withdraw `amount` of `asset` to an external address.
    async fn withdraw(
        &self,
        keys: &ExchangeKeys,
        asset: AssetKind,
        address: &str,
        amount: Decimal
    ) -> Result<Withdrawal>;
}
