//! Command handlers for the pocket CLI
//!
//! Each handler returns the JSON value to print; printing and error
//! reporting happen once, in [`crate::cli::Args::run`] and `main`.

pub mod api;
pub mod auth;
pub mod config;
pub mod providers;
