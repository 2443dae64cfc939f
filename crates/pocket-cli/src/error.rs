//! Error types for the pocket CLI

use color_eyre::eyre::Report;
use pocket_sdk::{ApiError, AuthError};
use serde_json::Value;
use thiserror::Error;

/// CLI error type with minimal variants
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file issues
    #[error("Configuration error: {0}")]
    Config(#[from] pocket_common::ConfigurationError),

    /// Request execution errors
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Credential and token errors
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Malformed command-line input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to serialize output: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Everything else (using color-eyre's Report for rich errors)
    #[error(transparent)]
    Internal(#[from] Report),
}

impl CliError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "config_error",
            CliError::Api(err) => err.code(),
            CliError::Auth(err) => err.code(),
            CliError::InvalidArgument(_) => "invalid_argument",
            CliError::Serialization(_) | CliError::Internal(_) => "internal_error",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            CliError::Api(err) => err.details(),
            CliError::Auth(err) => err.details(),
            _ => None,
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
