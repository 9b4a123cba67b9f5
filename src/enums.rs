use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };

use crate::error::AppError;

// ─── AssetKind ───────────────────────────────────────────────────────

/// Asset a credential converts its fiat deposits into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Base asset (BTC).
    Base,
    /// Alternate asset (ETH).
    Alt,
}

impl AssetKind {
    /// Value stored in `api_keys.cryptocurrency_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Base => "btc",
            AssetKind::Alt => "eth",
        }
    }

    /// Exchange trading pair against the fiat currency.
    pub fn pair(&self) -> &'static str {
        match self {
            AssetKind::Base => "btc_jpy",
            AssetKind::Alt => "eth_jpy",
        }
    }

    /// Withdrawal endpoint path for this asset.
    pub fn withdraw_path(&self) -> &'static str {
        match self {
            AssetKind::Base => "/api/send_money",
            AssetKind::Alt => "/api/send_ethereum",
        }
    }

    pub fn purchase_tx_type(&self) -> TxType {
        match self {
            AssetKind::Base => TxType::Purchase,
            AssetKind::Alt => TxType::EthPurchase,
        }
    }

    pub fn transfer_tx_type(&self) -> TxType {
        match self {
            AssetKind::Base => TxType::Transfer,
            AssetKind::Alt => TxType::EthTransfer,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "btc" | "base" => Ok(AssetKind::Base),
            "eth" | "alt" => Ok(AssetKind::Alt),
            _ => Err(AppError::Credential(format!("Unsupported asset type: {}", s))),
        }
    }
}

// ─── TxType ──────────────────────────────────────────────────────────

/// Ledger record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Deposit,
    Purchase,
    Transfer,
    EthPurchase,
    EthTransfer,
    Error,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "deposit",
            TxType::Purchase => "purchase",
            TxType::Transfer => "transfer",
            TxType::EthPurchase => "eth_purchase",
            TxType::EthTransfer => "eth_transfer",
            TxType::Error => "error",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TxType::Deposit),
            "purchase" => Ok(TxType::Purchase),
            "transfer" => Ok(TxType::Transfer),
            "eth_purchase" => Ok(TxType::EthPurchase),
            "eth_transfer" => Ok(TxType::EthTransfer),
            "error" => Ok(TxType::Error),
            _ => Err(AppError::Internal(format!("Unknown transaction type: {}", s))),
        }
    }
}

// ─── TxStatus ────────────────────────────────────────────────────────

/// Ledger record status. A completed record is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "completed" => Ok(TxStatus::Completed),
            "failed" => Ok(TxStatus::Failed),
            _ => Err(AppError::Internal(format!("Unknown transaction status: {}", s))),
        }
    }
}

// ─── JobFamily ───────────────────────────────────────────────────────

/// The two recurring job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFamily {
    DepositCheck,
    BalanceSync,
}

impl JobFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobFamily::DepositCheck => "deposit_check",
            JobFamily::BalanceSync => "balance_sync",
        }
    }
}

impl fmt::Display for JobFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
