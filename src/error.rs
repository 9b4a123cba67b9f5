use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Encryption error: {0}")] Encryption(String),

    #[error("Credential error: {0}")] Credential(String),

    #[error("Exchange rate limit exceeded: {0}")] RateLimited(String),

    #[error("Exchange API error: {message}")] ExchangeApi {
        status: Option<u16>,
        message: String,
        payload: Option<serde_json::Value>,
    },

    #[error("Not found: {0}")] NotFound(String),

    #[error("Job queue full: {0}")] QueueFull(String),

    #[error("Redis error: {0}")] Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    pub fn exchange(message: impl Into<String>) -> Self {
        AppError::ExchangeApi { status: None, message: message.into(), payload: None }
    }

    /// Stable code used in structured logs and ledger error payloads.
    pub fn classification(&self) -> &'static str {
        match self {
            AppError::Database(_) => "PERSISTENCE_ERROR",
            AppError::Encryption(_) | AppError::Credential(_) => "CREDENTIAL_ERROR",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::ExchangeApi { .. } => "EXTERNAL_API_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::QueueFull(_) => "QUEUE_FULL",
            AppError::Redis(_) => "REDIS_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }

    /// Structured detail recorded alongside an `error` ledger entry.
    pub fn ledger_payload(&self) -> serde_json::Value {
        let mut payload =
            serde_json::json!({
            "classification": self.classification(),
            "message": self.to_string(),
        });

        if let AppError::ExchangeApi { status, payload: details, .. } = self {
            if let Some(status) = status {
                payload["status"] = serde_json::json!(status);
            }
            if let Some(details) = details {
                payload["details"] = details.clone();
            }
        }

        payload
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.classification().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => axum::http::StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => axum::http::StatusCode::TOO_MANY_REQUESTS,
            AppError::ExchangeApi { .. } => axum::http::StatusCode::BAD_GATEWAY,
            AppError::QueueFull(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
