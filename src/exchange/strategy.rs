use std::sync::Arc;

use sea_orm::prelude::Decimal;

use crate::crypto::UnlockedCredential;
use crate::enums::{ AssetKind, TxType };
use crate::error::Result;

use super::{ ExchangeApi, ExchangeKeys, OrderFill, Withdrawal };

/// Buy-and-withdraw operations bound to one credential's configured asset.
///
/// Selected once per credential so the settlement loop never branches on asset type.
pub struct AssetStrategy {
    exchange: Arc<dyn ExchangeApi>,
    keys: ExchangeKeys,
    asset: AssetKind,
}

impl AssetStrategy {
    pub fn select(exchange: Arc<dyn ExchangeApi>, credential: &UnlockedCredential) -> Self {
        Self {
            exchange,
            keys: credential.keys.clone(),
            asset: credential.asset,
        }
    }

    pub fn asset(&self) -> AssetKind {
        self.asset
    }

    pub fn purchase_type(&self) -> TxType {
        self.asset.purchase_tx_type()
    }

    pub fn transfer_type(&self) -> TxType {
        self.asset.transfer_tx_type()
    }

    /// Spend `fiat_amount` on the configured asset at market.
    pub async fn buy(&self, fiat_amount: Decimal) -> Result<OrderFill> {
        self.exchange.market_buy(&self.keys, self.asset.pair(), fiat_amount).await
    }

    /// Send `amount` of the configured asset to `address`.
    pub async fn withdraw(&self, address: &str, amount: Decimal) -> Result<Withdrawal> {
        self.exchange.withdraw(&self.keys, self.asset, address, amount).await
    }
}
