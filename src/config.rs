use std::env;
use std::str::FromStr;

use crate::error::{ AppError, Result };

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub encryption_key: Vec<u8>,
    pub redis_url: String,
    pub settings_channel: String,
    pub exchange_base_url: String,
    pub fiat_currency: String,
    pub settings_owner: String,
    pub max_concurrent_credentials: usize,
    pub job_backoff_base_ms: u64,
    pub job_queue_capacity: usize,
    pub server_host: String,
    pub server_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let database_url = required("DATABASE_URL")?;

        let encryption_key_hex = required("ENCRYPTION_KEY")?;
        let encryption_key = hex
            ::decode(encryption_key_hex.trim())
            .map_err(|_| AppError::Config("ENCRYPTION_KEY must be a valid hex string".to_string()))?;

        if encryption_key.len() != 32 {
            return Err(
                AppError::Config("ENCRYPTION_KEY must be 32 bytes (64 hex characters)".to_string())
            );
        }

        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let settings_channel = env
            ::var("SETTINGS_CHANNEL")
            .unwrap_or_else(|_| crate::reconfig::DEFAULT_SETTINGS_CHANNEL.to_string());
        let exchange_base_url = env
            ::var("EXCHANGE_BASE_URL")
            .unwrap_or_else(|_| crate::exchange::DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let fiat_currency = env::var("FIAT_CURRENCY").unwrap_or_else(|_| "JPY".to_string());
        let settings_owner = env::var("SETTINGS_OWNER").unwrap_or_else(|_| "admin".to_string());

        let max_concurrent_credentials: usize = parsed("MAX_CONCURRENT_CREDENTIALS", 8)?;
        if max_concurrent_credentials == 0 {
            return Err(AppError::Config("MAX_CONCURRENT_CREDENTIALS must be at least 1".to_string()));
        }

        let job_backoff_base_ms = parsed("JOB_BACKOFF_BASE_MS", 1000)?;

        let job_queue_capacity: usize = parsed("JOB_QUEUE_CAPACITY", 100)?;
        if job_queue_capacity == 0 {
            return Err(AppError::Config("JOB_QUEUE_CAPACITY must be at least 1".to_string()));
        }

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = parsed("SERVER_PORT", 8080)?;

        Ok(Config {
            database_url,
            encryption_key,
            redis_url,
            settings_channel,
            exchange_base_url,
            fiat_currency,
            settings_owner,
            max_concurrent_credentials,
            job_backoff_base_ms,
            job_queue_capacity,
            server_host,
            server_port,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::Config(format!("{} must be set", key)))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) =>
            raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
