//! Provider error envelopes
//!
//! Providers report failures in a handful of JSON shapes. They are tried in
//! a fixed order; the first shape that matches wins and the raw status line
//! is used when none does.

use reqwest::StatusCode;
use serde_json::Value;

/// Error code and message extracted from a provider response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub code: Option<String>,
    pub message: String,
}

impl ProviderMessage {
    fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Fallback when the body matches no known envelope
    pub fn from_status(status: StatusCode) -> Self {
        let line = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };
        Self::new(None, line)
    }
}

/// Known error envelope shapes, in matching order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorEnvelope {
    /// `{"errors":[{"code":..,"message"|"detail"|"title":..}]}`
    ErrorsArray,
    /// `{"error":{"message":..,"code"|"type":..}}`
    ErrorObject,
    /// `{"error":"invalid_grant","error_description":..}`
    OAuthError,
    /// `{"detail":..}`
    Detail,
    /// `{"message":..,"code":..}`
    Message,
}

impl ErrorEnvelope {
    pub const ORDER: [ErrorEnvelope; 5] = [
        ErrorEnvelope::ErrorsArray,
        ErrorEnvelope::ErrorObject,
        ErrorEnvelope::OAuthError,
        ErrorEnvelope::Detail,
        ErrorEnvelope::Message,
    ];

    /// Try to extract a provider message using this envelope shape
    pub fn extract(self, body: &Value) -> Option<ProviderMessage> {
        match self {
            ErrorEnvelope::ErrorsArray => {
                let first = body.get("errors")?.as_array()?.first()?;
                let message = ["message", "detail", "title"]
                    .iter()
                    .find_map(|field| text(first.get(*field)?))?;
                Some(ProviderMessage::new(first.get("code").and_then(text), message))
            }
            ErrorEnvelope::ErrorObject => {
                let error = body.get("error")?;
                if !error.is_object() {
                    return None;
                }
                let message = error.get("message").and_then(text)?;
                let code = error
                    .get("code")
                    .and_then(text)
                    .or_else(|| error.get("type").and_then(text));
                Some(ProviderMessage::new(code, message))
            }
            ErrorEnvelope::OAuthError => {
                let code = body.get("error")?.as_str()?.to_string();
                let message = body
                    .get("error_description")
                    .and_then(text)
                    .unwrap_or_else(|| code.clone());
                Some(ProviderMessage::new(Some(code), message))
            }
            ErrorEnvelope::Detail => {
                let message = text(body.get("detail")?)?;
                Some(ProviderMessage::new(None, message))
            }
            ErrorEnvelope::Message => {
                let message = text(body.get("message")?)?;
                Some(ProviderMessage::new(body.get("code").and_then(text), message))
            }
        }
    }
}

/// Parse a provider error body, returning `None` when no envelope matches
pub fn parse_error_body(body: &[u8]) -> Option<ProviderMessage> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ErrorEnvelope::ORDER
        .iter()
        .find_map(|envelope| envelope.extract(&value))
}

/// Provider message for a failed response, falling back to the status line
pub fn provider_message(status: StatusCode, body: &[u8]) -> ProviderMessage {
    parse_error_body(body).unwrap_or_else(|| ProviderMessage::from_status(status))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
