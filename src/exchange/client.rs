use std::sync::atomic::{ AtomicU64, Ordering };

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use reqwest::{ header::CONTENT_TYPE, Method };
use sea_orm::prelude::Decimal;
use serde_json::{ json, Value };

use crate::enums::AssetKind;
use crate::error::{ AppError, Result };

use super::models::deposits_from_json;
use super::{ sign_request, BalanceSnapshot, Deposit, ExchangeApi, ExchangeKeys, OrderFill, Withdrawal };

pub const DEFAULT_BASE_URL: &str = "https://coincheck.com";

/// Stateless client for the exchange's signed REST API.
pub struct CoincheckClient {
    client: reqwest::Client,
    base_url: String,
    last_nonce: AtomicU64,
}

impl CoincheckClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client
            ::builder()
            .user_agent(concat!("deposit-settler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_nonce: AtomicU64::new(0),
        })
    }

    /// Millisecond nonce, strictly increasing within this process.
    fn next_nonce(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let previous = self.last_nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(0);

        now.max(previous + 1)
    }

    async fn send_signed(
        &self,
        keys: &ExchangeKeys,
        method: Method,
        path: &str,
        body: Option<Value>
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let nonce = self.next_nonce();
        let signature = sign_request(keys.secret_key(), nonce, &url, &body)?;

        tracing::debug!(method = %method, path, "Sending signed exchange request");

        let mut request = self.client
            .request(method, &url)
            .header("ACCESS-KEY", keys.access_key())
            .header("ACCESS-NONCE", nonce.to_string())
            .header("ACCESS-SIGNATURE", signature)
            .header(CONTENT_TYPE, "application/json");

        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request
            .send().await
            .map_err(|e| AppError::exchange(format!("Exchange request to {} failed: {}", path, e)))?;

        let status = response.status().as_u16();
        let text = response
            .text().await
            .map_err(|e| AppError::exchange(format!("Failed to read exchange response: {}", e)))?;

        classify_response(status, &text)
    }
}

/// Map a raw exchange response to a JSON body or a classified error.
pub fn classify_response(status: u16, body: &str) -> Result<Value> {
    if status == 429 {
        return Err(AppError::RateLimited(format!("exchange returned HTTP 429: {}", body.trim())));
    }

    let payload: Value = serde_json
        ::from_str(body)
        .unwrap_or_else(|_| Value::String(body.to_string()));

    let error_message = payload
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);

    if !(200..300).contains(&status) {
        return Err(AppError::ExchangeApi {
            status: Some(status),
            message: error_message.unwrap_or_else(|| format!("exchange returned HTTP {}", status)),
            payload: Some(payload),
        });
    }

    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(AppError::ExchangeApi {
            status: Some(status),
            message: error_message.unwrap_or_else(|| "exchange reported failure".to_string()),
            payload: Some(payload),
        });
    }

    Ok(payload)
}

#[async_trait]
impl ExchangeApi for CoincheckClient {
    async fn get_balance(&self, keys: &ExchangeKeys) -> Result<BalanceSnapshot> {
        let body = self.send_signed(keys, Method::GET, "/api/accounts/balance", None).await?;
        BalanceSnapshot::from_json(&body)
    }

    async fn get_deposits(
        &self,
        keys: &ExchangeKeys,
        currency: &str,
        confirmed_after: Option<DateTime<Utc>>
    ) -> Result<Vec<Deposit>> {
        let path = format!("/api/deposit_money?currency={}", urlencoding::encode(currency));
        let body = self.send_signed(keys, Method::GET, &path, None).await?;
        deposits_from_json(&body, confirmed_after)
    }

    async fn market_buy(
        &self,
        keys: &ExchangeKeys,
        pair: &str,
        fiat_amount: Decimal
    ) -> Result<OrderFill> {
        let order =
            json!({
            "pair": pair,
            "order_type": "market_buy",
            "market_buy_amount": fiat_amount.to_string(),
        });

        let mut body = self.send_signed(
            keys,
            Method::POST,
            "/api/exchange/orders",
            Some(order)
        ).await?;

        // Keep the requested spend so a fill can be derived from the rate.
        if body.is_object() && body.get("market_buy_amount").map_or(true, Value::is_null) {
            body["market_buy_amount"] = json!(fiat_amount.to_string());
        }

        OrderFill::from_json(&body)
    }

    async fn withdraw(
        &self,
        keys: &ExchangeKeys,
        asset: AssetKind,
        address: &str,
        amount: Decimal
    ) -> Result<Withdrawal> {
        let request =
            json!({
            "address": address,
            "amount": amount.to_string(),
        });

        let body = self.send_signed(keys, Method::POST, asset.withdraw_path(), Some(request)).await?;
        Withdrawal::from_json(&body, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_rate_limited() {
        let err = classify_response(429, "Too Many Requests").unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_other_http_errors_carry_status_and_payload() {
        let err = classify_response(400, r#"{"success":false,"error":"Amount is too small"}"#).unwrap_err();

        match err {
            AppError::ExchangeApi { status, message, payload } => {
                assert_eq!(status, Some(400));
                assert_eq!(message, "Amount is too small");
                assert_eq!(payload.unwrap()["success"], false);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let server = classify_response(503, "<html>down</html>").unwrap_err();
        assert!(!server.is_rate_limited());
        assert_eq!(server.classification(), "EXTERNAL_API_ERROR");
    }

    #[test]
    fn test_success_false_on_200_is_error() {
        let err = classify_response(200, r#"{"success":false,"error":"invalid authentication"}"#);
        assert!(matches!(err, Err(AppError::ExchangeApi { status: Some(200), .. })));
    }

    #[test]
    fn test_success_body_is_returned() {
        let body = classify_response(200, r#"{"success":true,"jpy":"1"}"#).unwrap();
        assert_eq!(body["jpy"], "1");
    }

    #[test]
    fn test_nonce_strictly_increases() {
        let client = CoincheckClient::new("https://example.invalid/").unwrap();
        let first = client.next_nonce();
        let second = client.next_nonce();
        let third = client.next_nonce();

        assert!(second > first);
        assert!(third > second);
        assert_eq!(client.base_url, "https://example.invalid");
    }
}
