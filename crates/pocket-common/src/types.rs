//! Common types used across pocket crates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for provider name validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderNameError {
    #[error("Provider name cannot be empty")]
    Empty,
    #[error("Provider name too long (max 32 characters)")]
    TooLong,
    #[error("Provider name contains invalid characters. Only lowercase letters, digits and hyphens are allowed")]
    InvalidCharacters,
}

/// A validated provider name such as `spotify` or `amazon-sp`
///
/// Provider names must:
/// - Be between 1 and 32 characters long
/// - Only contain lowercase ASCII letters, digits and hyphens
///
/// The name also determines the credential store key layout: hyphens become
/// underscores, so `amazon-sp` owns keys like `amazon_sp_refresh_token`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderName(String);

impl ProviderName {
    /// Create a new validated provider name
    pub fn new(name: impl Into<String>) -> Result<Self, ProviderNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Name from a literal known to be valid, such as a built-in provider
    pub fn from_static(name: &'static str) -> Self {
        debug_assert!(Self::validate(name).is_ok(), "invalid provider name {name}");
        Self(name.to_string())
    }

    fn validate(name: &str) -> Result<(), ProviderNameError> {
        if name.is_empty() {
            return Err(ProviderNameError::Empty);
        }

        if name.len() > 32 {
            return Err(ProviderNameError::TooLong);
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ProviderNameError::InvalidCharacters);
        }

        Ok(())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix shared by every credential key of this provider
    pub fn key_prefix(&self) -> String {
        self.0.replace('-', "_")
    }

    /// Full credential store key for `suffix`, e.g. `spotify_client_id`
    pub fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.key_prefix(), suffix)
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProviderName {
    type Err = ProviderNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ProviderName {
    type Error = ProviderNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProviderName> for String {
    fn from(name: ProviderName) -> Self {
        name.0
    }
}

impl AsRef<str> for ProviderName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name_valid() {
        assert!(ProviderName::new("spotify").is_ok());
        assert!(ProviderName::new("amazon-sp").is_ok());
        assert!(ProviderName::new("x").is_ok());
        assert!(ProviderName::new("docker-hub2").is_ok());

        let max_name = "a".repeat(32);
        assert!(ProviderName::new(max_name).is_ok());
    }

    #[test]
    fn test_provider_name_invalid() {
        assert_eq!(ProviderName::new(""), Err(ProviderNameError::Empty));
        assert_eq!(
            ProviderName::new("a".repeat(33)),
            Err(ProviderNameError::TooLong)
        );
        for bad in ["Spotify", "amazon_sp", "two words", "x/y", "café"] {
            assert_eq!(
                ProviderName::new(bad),
                Err(ProviderNameError::InvalidCharacters),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_store_key_layout() {
        let name = ProviderName::new("amazon-sp").unwrap();
        assert_eq!(name.key_prefix(), "amazon_sp");
        assert_eq!(name.key("refresh_token"), "amazon_sp_refresh_token");

        let name = ProviderName::new("spotify").unwrap();
        assert_eq!(name.key("token_expiry"), "spotify_token_expiry");
    }

    #[test]
    fn test_provider_name_serialization() {
        let name = ProviderName::new("twilio").unwrap();
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"twilio\"");

        let parsed: ProviderName = serde_json::from_str("\"vercel\"").unwrap();
        assert_eq!(parsed.as_str(), "vercel");

        let result: Result<ProviderName, _> = serde_json::from_str("\"Not Valid\"");
        assert!(result.is_err());
    }
}
