//! Pocket SDK
//!
//! Credential storage, OAuth token lifecycle and authenticated HTTP
//! requests for the providers exposed by the `pocket` CLI.
//!
//! The pieces, leaves first:
//! - [`store`]: durable key/value credential storage
//! - [`auth::TokenCache`]: per-provider, lock-guarded token cache
//! - [`auth::TokenManager`]: token acquisition for every supported flow
//! - [`client::ApiClient`]: request execution with uniform error classification

pub mod auth;
pub mod client;
pub mod envelope;
pub mod error;
pub mod store;

pub use auth::{
    AuthError, AuthFlow, AuthResult, BrowserLauncher, OAuth1Credentials, ProviderAuth,
    ProviderRegistry, TokenCache, TokenManager, TokenState,
};
pub use client::{ApiClient, AuthStrategy, ClientBuilder, RequestBody};
pub use envelope::ProviderMessage;
pub use error::{ApiError, Result};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
