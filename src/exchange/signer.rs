use hmac::{ Hmac, Mac };
use sha2::Sha256;

use crate::error::{ AppError, Result };

type HmacSha256 = Hmac<Sha256>;

/// Plaintext exchange key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct ExchangeKeys {
    access_key: String,
    secret_key: String,
}

impl ExchangeKeys {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl std::fmt::Debug for ExchangeKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeKeys")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Hex HMAC-SHA256 of `nonce + url + body` keyed by the secret.
pub fn sign_request(secret_key: &str, nonce: u64, url: &str, body: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).map_err(|e|
        AppError::Internal(format!("Invalid HMAC key: {}", e))
    )?;

    mac.update(nonce.to_string().as_bytes());
    mac.update(url.as_bytes());
    mac.update(body.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_matches_concatenated_message() {
        let nonce = 1_700_000_000_123u64;
        let url = "https://coincheck.com/api/accounts/balance";

        let split = sign_request("secret", nonce, url, "").unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(format!("{}{}", nonce, url).as_bytes());
        let joined = hex::encode(mac.finalize().into_bytes());

        assert_eq!(split, joined);
        assert_eq!(split.len(), 64);
    }

    #[test]
    fn test_body_changes_signature() {
        let url = "https://coincheck.com/api/exchange/orders";
        let empty = sign_request("secret", 1, url, "").unwrap();
        let with_body = sign_request("secret", 1, url, r#"{"pair":"btc_jpy"}"#).unwrap();

        assert_ne!(empty, with_body);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let keys = ExchangeKeys::new("public", "very-secret");
        let rendered = format!("{:?}", keys);

        assert!(rendered.contains("public"));
        assert!(!rendered.contains("very-secret"));
    }
}
