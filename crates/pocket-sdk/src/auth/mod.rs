//! Authentication module for the pocket SDK
//!
//! This module provides:
//! - Per-provider token caching with write-through persistence
//! - Client-credentials and refresh-token grants (with refresh token rotation)
//! - The interactive authorization-code + PKCE flow with a loopback callback server
//! - OAuth 1.0a HMAC-SHA1 request signing

pub mod cache;
pub mod callback_server;
pub mod grants;
pub mod launcher;
pub mod manager;
pub mod oauth1;
pub mod pkce;
pub mod providers;
pub mod types;

// Re-export commonly used types and functions
pub use cache::{TokenCache, TokenGuard};
pub use callback_server::CallbackServer;
pub use launcher::{BrowserLauncher, NoopLauncher};
pub use manager::{AuthHeader, TokenManager, TokenStatus};
pub use oauth1::OAuth1Credentials;
pub use pkce::PkceExchange;
pub use providers::{
    AuthFlow, PkceSettings, ProviderAuth, ProviderInfo, ProviderOverrides, ProviderRegistry,
    TokenPlacement,
};
pub use types::{AuthError, AuthResult, TokenResponse, TokenState};
