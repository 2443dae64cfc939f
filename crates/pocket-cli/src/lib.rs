//! # Pocket CLI
//!
//! Command-line access to third-party APIs with managed credentials.
//!
//! ## Architecture
//!
//! - Clap-based argument parsing with derive macros
//! - Handler-based command processing; handlers return JSON values
//! - figment configuration layered over built-in provider defaults
//! - Token lifecycle and request execution delegated to `pocket-sdk`

pub mod cli;
pub mod config;
pub mod error;
pub mod launcher;
pub mod output;

pub use cli::*;
pub use error::*;
