//! # Pocket Common
//!
//! Shared building blocks for the pocket workspace:
//! - Logging initialization for the CLI binary
//! - Configuration error type used by every crate that reads settings
//! - Validated provider names and the credential key layout derived from them

pub mod constants;
pub mod error;
pub mod logging;
pub mod types;

pub use constants::*;
pub use error::ConfigurationError;
pub use types::{ProviderName, ProviderNameError};
