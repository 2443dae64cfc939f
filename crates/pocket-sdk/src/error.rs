//! Error types for authenticated API requests

use crate::auth::AuthError;
use serde_json::{json, Value};

/// Classified failure of an authenticated request
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Provider throttled the request (HTTP 429)
    #[error("Rate limited: {message}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },

    /// Token was rejected mid-use (HTTP 401); the cached token has been dropped
    #[error("Authentication expired: {message}. Run the command again to refresh the token")]
    AuthExpired {
        provider: Option<String>,
        message: String,
    },

    /// HTTP 403
    #[error("Forbidden: {message}")]
    Forbidden {
        code: Option<String>,
        message: String,
    },

    /// HTTP 404
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Any other non-success status
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Failed to obtain credentials for the request
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Invalid request
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {message}")]
    Decode { message: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::AuthExpired { .. } => "auth_expired",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::NotFound { .. } => "not_found",
            ApiError::Api { .. } | ApiError::Decode { .. } => "api_error",
            ApiError::Auth(err) => err.code(),
            ApiError::HttpClient(_) => "network_error",
            ApiError::InvalidRequest { .. } => "invalid_argument",
        }
    }

    /// Structured details for the error report, if the error carries any
    pub fn details(&self) -> Option<Value> {
        match self {
            ApiError::RateLimited {
                retry_after_secs, ..
            } => Some(json!({ "retry_after_seconds": retry_after_secs })),
            ApiError::AuthExpired {
                provider: Some(provider),
                ..
            } => Some(json!({ "provider": provider })),
            ApiError::Forbidden {
                code: Some(code), ..
            } => Some(json!({ "provider_code": code })),
            ApiError::Api { status, code, .. } => {
                Some(json!({ "status": status, "provider_code": code }))
            }
            ApiError::Auth(err) => err.details(),
            _ => None,
        }
    }

    /// Whether a later attempt could succeed without user intervention
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::AuthExpired { .. } => true,
            ApiError::HttpClient(err) => err.is_timeout() || err.is_connect(),
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
