//! Authentication-related types and data structures
//!
//! This module defines the token state tracked per provider, the token
//! endpoint response shape and the error type shared by every auth flow.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use pocket_common::TOKEN_EXPIRY_MARGIN;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result type for authentication operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Lifetime assumed when a token endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Longest lifetime recorded for a token, ten years
const MAX_EXPIRES_IN: u64 = 10 * 365 * 24 * 3600;

/// Per-provider token record
///
/// An empty `access_token` means the token was never fetched or has been
/// invalidated; the refresh token (if any) survives invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    /// Access token for API requests
    pub access_token: String,
    /// Optional refresh token for token renewal
    pub refresh_token: Option<String>,
    /// Instant after which the access token must not be used
    pub expires_at: DateTime<Utc>,
    /// Scopes granted with this token, space separated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenState {
    /// Create a new token state
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            scope: None,
        }
    }

    /// A state that only carries a refresh token
    pub fn refresh_only(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: Some(refresh_token.into()),
            ..Self::default()
        }
    }

    /// Whether the access token can still be used at `now`
    ///
    /// Tokens within the expiry margin of `expires_at` count as expired.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        let margin = ChronoDuration::from_std(TOKEN_EXPIRY_MARGIN).unwrap_or_default();
        now + margin < self.expires_at
    }

    /// Whether the access token can still be used right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Drop the access token but keep the refresh token
    pub fn invalidate(&mut self) {
        self.access_token.clear();
        self.expires_at = DateTime::<Utc>::MIN_UTC;
    }

    /// Whether this state carries anything worth keeping
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_none()
    }
}

impl Default for TokenState {
    fn default() -> Self {
        Self::new(String::new(), None, DateTime::<Utc>::MIN_UTC)
    }
}

/// Successful response of an OAuth2 token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Convert into a token state expiring `early_by` before the advertised lifetime
    ///
    /// Providers that rotate refresh tokens send a new one with every
    /// response; otherwise `previous_refresh` is carried over.
    pub fn into_token_state(
        self,
        previous_refresh: Option<String>,
        early_by: Duration,
    ) -> TokenState {
        let lifetime = self
            .expires_in
            .unwrap_or(DEFAULT_EXPIRES_IN)
            .min(MAX_EXPIRES_IN)
            .saturating_sub(early_by.as_secs());
        let now = Utc::now();
        let expires_at = i64::try_from(lifetime)
            .ok()
            .and_then(|secs| now.checked_add_signed(ChronoDuration::seconds(secs)))
            .unwrap_or(now);

        TokenState {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at,
            scope: self.scope,
        }
    }
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Required credentials are not configured
    #[error("Missing configuration: {}. Run: {hint}", .keys.join(", "))]
    ConfigMissing { keys: Vec<String>, hint: String },

    /// Token endpoint rejected the request
    #[error("Token request failed with status {status}: {message}. Check the configured credentials")]
    AuthFailed { status: u16, message: String },

    /// OAuth authorization was denied by the user or the provider
    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    /// State parameter mismatch (CSRF protection)
    #[error("Authorization denied: state parameter does not match this login attempt")]
    StateMismatch,

    /// No callback arrived in time
    #[error("Authorization timed out after {waited_secs} seconds without a callback")]
    Timeout { waited_secs: u64 },

    /// Callback server error
    #[error("Callback server error: {0}")]
    CallbackServerError(String),

    /// Network error while talking to a token endpoint
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid OAuth response
    #[error("Invalid OAuth response: {0}")]
    InvalidResponse(String),

    /// Credential store error
    #[error("Credential storage error: {0}")]
    StorageError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown provider '{0}'. Run 'pocket providers' to list supported providers")]
    UnknownProvider(String),

    #[error("Provider '{provider}' does not support {operation}")]
    UnsupportedFlow {
        provider: String,
        operation: &'static str,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl AuthError {
    /// Missing credential keys with the command that sets the first one
    pub fn config_missing(keys: Vec<String>) -> Self {
        let hint = match keys.first() {
            Some(key) => format!("pocket config set {key} <value>"),
            None => "pocket config list".to_string(),
        };
        Self::ConfigMissing { keys, hint }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigMissing { .. } => "config_missing",
            Self::AuthFailed { .. } => "auth_failed",
            Self::AuthorizationDenied(_) | Self::StateMismatch => "auth_denied",
            Self::Timeout { .. } => "auth_timeout",
            Self::CallbackServerError(_) | Self::InvalidResponse(_) => "auth_error",
            Self::NetworkError(_) => "network_error",
            Self::StorageError(_) | Self::IoError(_) | Self::SerdeError(_) => "storage_error",
            Self::ConfigError(_) | Self::UnknownProvider(_) | Self::UnsupportedFlow { .. } => {
                "config_error"
            }
        }
    }

    /// Structured details for the error report, if the error carries any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ConfigMissing { keys, hint } => {
                Some(serde_json::json!({ "missing_keys": keys, "hint": hint }))
            }
            Self::AuthFailed { status, .. } => Some(serde_json::json!({ "status": status })),
            Self::Timeout { waited_secs } => {
                Some(serde_json::json!({ "waited_seconds": waited_secs }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_expiring_in(secs: i64) -> TokenState {
        TokenState::new("token", None, Utc::now() + ChronoDuration::seconds(secs))
    }

    #[test]
    fn test_expiry_margin_boundary() {
        let now = Utc::now();
        let almost = TokenState::new("t", None, now + ChronoDuration::seconds(59));
        let enough = TokenState::new("t", None, now + ChronoDuration::seconds(61));

        assert!(!almost.is_valid_at(now));
        assert!(enough.is_valid_at(now));
    }

    #[test]
    fn test_empty_access_token_is_never_valid() {
        let state = TokenState::new("", None, Utc::now() + ChronoDuration::hours(1));
        assert!(!state.is_valid());
    }

    #[test]
    fn test_invalidate_keeps_refresh_token() {
        let mut state = state_expiring_in(3600);
        state.refresh_token = Some("refresh".to_string());
        assert!(state.is_valid());

        state.invalidate();
        assert!(!state.is_valid());
        assert_eq!(state.refresh_token.as_deref(), Some("refresh"));
        assert!(!state.is_empty());
    }

    #[test]
    fn test_token_response_conversion() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A","expires_in":3600}"#).unwrap();
        let before = Utc::now();
        let state = response.into_token_state(Some("old".to_string()), Duration::from_secs(60));

        assert_eq!(state.access_token, "A");
        assert_eq!(state.refresh_token.as_deref(), Some("old"));
        let lifetime = (state.expires_at - before).num_seconds();
        assert!((3539..=3541).contains(&lifetime), "lifetime was {lifetime}");
    }

    #[test]
    fn test_huge_expires_in_is_clamped() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"A","expires_in":9000000000000}"#).unwrap();
        let before = Utc::now();
        let state = response.into_token_state(None, Duration::ZERO);

        assert!(state.is_valid());
        let lifetime = (state.expires_at - before).num_seconds();
        assert!(lifetime <= MAX_EXPIRES_IN as i64 + 1, "lifetime was {lifetime}");
        assert!(lifetime >= MAX_EXPIRES_IN as i64 - 1, "lifetime was {lifetime}");

        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"B","expires_in":18446744073709551615}"#)
                .unwrap();
        assert!(response.into_token_state(None, TOKEN_EXPIRY_MARGIN).is_valid());
    }

    #[test]
    fn test_token_response_rotates_refresh_token() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"A","refresh_token":"new","expires_in":7200,"scope":"a b"}"#,
        )
        .unwrap();
        let state = response.into_token_state(Some("old".to_string()), Duration::ZERO);

        assert_eq!(state.refresh_token.as_deref(), Some("new"));
        assert_eq!(state.scope.as_deref(), Some("a b"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AuthError::config_missing(vec!["spotify_client_id".into()]).code(),
            "config_missing"
        );
        assert_eq!(AuthError::StateMismatch.code(), "auth_denied");
        assert_eq!(AuthError::Timeout { waited_secs: 300 }.code(), "auth_timeout");
        assert_eq!(
            AuthError::AuthFailed {
                status: 400,
                message: "invalid_client".into()
            }
            .code(),
            "auth_failed"
        );
    }

    #[test]
    fn test_config_missing_message_names_keys_and_hint() {
        let err = AuthError::config_missing(vec![
            "spotify_client_id".to_string(),
            "spotify_client_secret".to_string(),
        ]);
        let message = err.to_string();
        assert!(message.contains("spotify_client_id, spotify_client_secret"));
        assert!(message.contains("pocket config set spotify_client_id <value>"));
    }
}
