use std::str::FromStr;

use chrono::{ DateTime, Utc };
use sea_orm::prelude::Decimal;
use serde_json::Value;

use crate::error::{ AppError, Result };

const CONFIRMED: &str = "confirmed";

/// A fiat deposit reported by the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Deposit {
    pub id: String,
    pub amount: Decimal,
    pub status: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl Deposit {
    pub fn from_json(value: &Value) -> Result<Self> {
        let id = id_field(value, "id")?;
        let amount = decimal_field(value, "amount")?.ok_or_else(||
            malformed(format!("deposit {} has no amount", id))
        )?;

        let confirmed_at = match value.get("confirmed_at").and_then(Value::as_str) {
            Some(raw) =>
                Some(
                    DateTime::parse_from_rfc3339(raw)
                        .map_err(|e| malformed(format!("deposit {} confirmed_at: {}", id, e)))?
                        .with_timezone(&Utc)
                ),
            None => None,
        };

        Ok(Self {
            id,
            amount,
            status: string_field(value, "status").unwrap_or_default(),
            confirmed_at,
            raw: value.clone(),
        })
    }

    /// Confirmed strictly after `cursor`. Unconfirmed or undated deposits never qualify.
    pub fn is_confirmed_after(&self, cursor: Option<DateTime<Utc>>) -> bool {
        if self.status != CONFIRMED {
            return false;
        }

        match (self.confirmed_at, cursor) {
            (Some(confirmed_at), Some(cursor)) => confirmed_at > cursor,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Result of a market buy order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFill {
    pub id: String,
    /// Asset quantity acquired.
    pub amount: Decimal,
    pub rate: Option<Decimal>,
    pub raw: Value,
}

impl OrderFill {
    pub fn from_json(value: &Value) -> Result<Self> {
        let id = id_field(value, "id")?;
        let rate = decimal_field(value, "rate")?;

        let amount = match decimal_field(value, "amount")? {
            Some(amount) => amount,
            None => {
                // Market buys may report only the fiat spent; derive the fill from the rate.
                let spent = decimal_field(value, "market_buy_amount")?;
                match (spent, rate) {
                    (Some(spent), Some(rate)) if rate > Decimal::ZERO => truncate_8(spent / rate),
                    _ => {
                        return Err(
                            malformed(format!("order {}: order filled amount unavailable", id))
                        );
                    }
                }
            }
        };

        Ok(Self { id, amount, rate, raw: value.clone() })
    }
}

/// Result of an asset withdrawal submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub id: String,
    pub amount: Decimal,
    pub raw: Value,
}

impl Withdrawal {
    pub fn from_json(value: &Value, requested: Decimal) -> Result<Self> {
        Ok(Self {
            id: id_field(value, "id")?,
            amount: decimal_field(value, "amount")?.unwrap_or(requested),
            raw: value.clone(),
        })
    }
}

/// Available and reserved quantities for fiat and both supported assets.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    pub jpy: Decimal,
    pub btc: Decimal,
    pub eth: Decimal,
    pub jpy_reserved: Decimal,
    pub btc_reserved: Decimal,
    pub eth_reserved: Decimal,
    pub raw: Value,
}

impl BalanceSnapshot {
    pub fn from_json(value: &Value) -> Result<Self> {
        let field = |key: &str| -> Result<Decimal> {
            Ok(decimal_field(value, key)?.unwrap_or(Decimal::ZERO))
        };

        Ok(Self {
            jpy: field("jpy")?,
            btc: field("btc")?,
            eth: field("eth")?,
            jpy_reserved: field("jpy_reserved")?,
            btc_reserved: field("btc_reserved")?,
            eth_reserved: field("eth_reserved")?,
            raw: value.clone(),
        })
    }
}

/// Parse the deposits of a deposit-history response that are confirmed after
/// `confirmed_after`. Entries that can never qualify are skipped without being
/// parsed in full, so a broken pending or historical row does not hide new ones.
pub(crate) fn deposits_from_json(
    value: &Value,
    confirmed_after: Option<DateTime<Utc>>
) -> Result<Vec<Deposit>> {
    let items = value
        .get("deposits")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("deposit history has no deposits array".to_string()))?;

    let mut deposits = Vec::new();
    for item in items {
        let deposit_id = id_field(item, "id").unwrap_or_default();

        if item.get("status").and_then(Value::as_str) != Some(CONFIRMED) {
            tracing::debug!(deposit_id = %deposit_id, "Skipping unconfirmed deposit");
            continue;
        }

        let confirmed_at = item
            .get("confirmed_at")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc));
        let Some(confirmed_at) = confirmed_at else {
            tracing::warn!(deposit_id = %deposit_id, "Confirmed deposit has no readable confirmed_at, skipping");
            continue;
        };

        if confirmed_after.is_some_and(|after| confirmed_at <= after) {
            continue;
        }

        deposits.push(Deposit::from_json(item)?);
    }

    Ok(deposits)
}

fn malformed(message: String) -> AppError {
    AppError::exchange(format!("Malformed exchange response: {}", message))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn id_field(value: &Value, key: &str) -> Result<String> {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(malformed(format!("missing {}", key))),
    }
}

/// Amounts arrive either as JSON strings or numbers.
fn decimal_field(value: &Value, key: &str) -> Result<Option<Decimal>> {
    let raw = match value.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(malformed(format!("{} is not numeric: {}", key, other)));
        }
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| malformed(format!("{} is not a decimal: {}", key, raw)))
}

fn truncate_8(value: Decimal) -> Decimal {
    let scale = Decimal::new(100_000_000, 0);
    (value * scale).trunc() / scale
}
