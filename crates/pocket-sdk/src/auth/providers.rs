//! Provider auth configuration and the built-in registry
//!
//! Every provider resolves to one [`AuthFlow`] plus a [`TokenPlacement`]
//! describing which header carries the credential on API requests.

use super::types::{AuthError, AuthResult};
use crate::store::keys;
use pocket_common::{ProviderName, DEFAULT_CALLBACK_PORT, DEFAULT_CALLBACK_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Settings for the interactive authorization-code + PKCE flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceSettings {
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub callback_port: u16,
    pub callback_path: String,
    pub callback_timeout: Duration,
}

impl PkceSettings {
    pub fn new(auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            scopes: Vec::new(),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_path: "/callback".to_string(),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Loopback redirect URI registered with the provider
    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}{}", self.callback_port, self.callback_path)
    }
}

/// How a provider obtains the credential placed on requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFlow {
    /// `grant_type=client_credentials` with HTTP Basic client auth
    ClientCredentials { token_url: String },
    /// Long-lived refresh token exchanged for short-lived access tokens
    RefreshToken { token_url: String },
    /// Interactive authorization code with PKCE, refreshed afterwards
    AuthorizationCode(PkceSettings),
    /// OAuth 1.0a HMAC-SHA1 request signing
    OAuth1,
    /// HTTP Basic from two configured keys
    Basic {
        username_key: String,
        password_key: String,
    },
    /// A configured token placed verbatim
    StaticToken { token_key: String },
}

impl AuthFlow {
    /// Stable name used in status output
    pub fn kind(&self) -> &'static str {
        match self {
            AuthFlow::ClientCredentials { .. } => "client_credentials",
            AuthFlow::RefreshToken { .. } => "refresh_token",
            AuthFlow::AuthorizationCode(_) => "authorization_code_pkce",
            AuthFlow::OAuth1 => "oauth1",
            AuthFlow::Basic { .. } => "basic",
            AuthFlow::StaticToken { .. } => "static_token",
        }
    }

    /// Whether tokens for this flow live in the token cache
    pub fn uses_token_cache(&self) -> bool {
        matches!(
            self,
            AuthFlow::ClientCredentials { .. }
                | AuthFlow::RefreshToken { .. }
                | AuthFlow::AuthorizationCode(_)
        )
    }

    pub fn token_url(&self) -> Option<&str> {
        match self {
            AuthFlow::ClientCredentials { token_url } | AuthFlow::RefreshToken { token_url } => {
                Some(token_url)
            }
            AuthFlow::AuthorizationCode(settings) => Some(&settings.token_url),
            _ => None,
        }
    }
}

/// Header carrying the credential on API requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPlacement {
    pub header: String,
    pub scheme: Option<String>,
}

impl TokenPlacement {
    /// `Authorization: Bearer <token>`
    pub fn bearer() -> Self {
        Self::scheme("Bearer")
    }

    /// `Authorization: <scheme> <token>`
    pub fn scheme(scheme: impl Into<String>) -> Self {
        Self {
            header: "Authorization".to_string(),
            scheme: Some(scheme.into()),
        }
    }

    /// `<header>: <token>` without a scheme
    pub fn header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            scheme: None,
        }
    }

    /// Header value for a token
    pub fn render(&self, token: &str) -> String {
        match &self.scheme {
            Some(scheme) => format!("{} {}", scheme, token),
            None => token.to_string(),
        }
    }
}

/// Endpoint overrides read from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    pub token_url: Option<String>,
    pub auth_url: Option<String>,
    pub api_base_url: Option<String>,
    pub callback_port: Option<u16>,
    pub callback_timeout_secs: Option<u64>,
    pub scopes: Option<Vec<String>>,
}

/// Auth configuration of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAuth {
    pub name: ProviderName,
    pub flow: AuthFlow,
    pub placement: TokenPlacement,
    pub api_base_url: Option<String>,
}

impl ProviderAuth {
    pub fn new(name: ProviderName, flow: AuthFlow) -> Self {
        Self {
            name,
            flow,
            placement: TokenPlacement::bearer(),
            api_base_url: None,
        }
    }

    pub fn with_placement(mut self, placement: TokenPlacement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Store key for one of this provider's entries
    pub fn key(&self, suffix: &str) -> String {
        self.name.key(suffix)
    }

    /// Store keys the user must configure before the flow can run
    pub fn required_keys(&self) -> Vec<String> {
        let suffixes: Vec<&str> = match &self.flow {
            AuthFlow::ClientCredentials { .. } => vec![keys::CLIENT_ID, keys::CLIENT_SECRET],
            AuthFlow::RefreshToken { .. } => {
                vec![keys::CLIENT_ID, keys::CLIENT_SECRET, keys::REFRESH_TOKEN]
            }
            AuthFlow::AuthorizationCode(_) => vec![keys::CLIENT_ID],
            AuthFlow::OAuth1 => vec![
                keys::CONSUMER_KEY,
                keys::CONSUMER_SECRET,
                keys::ACCESS_TOKEN,
                keys::ACCESS_SECRET,
            ],
            AuthFlow::Basic {
                username_key,
                password_key,
            } => vec![username_key.as_str(), password_key.as_str()],
            AuthFlow::StaticToken { token_key } => vec![token_key.as_str()],
        };
        suffixes.into_iter().map(|s| self.key(s)).collect()
    }

    /// Absolute URL for a request path
    ///
    /// Absolute URLs pass through; relative paths need an API base URL.
    pub fn resolve_url(&self, path: &str) -> Option<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }
        let base = self.api_base_url.as_deref()?;
        Some(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    /// Apply configured endpoint overrides
    pub fn apply(&mut self, overrides: &ProviderOverrides) {
        if let Some(url) = &overrides.api_base_url {
            self.api_base_url = Some(url.clone());
        }
        match &mut self.flow {
            AuthFlow::ClientCredentials { token_url } | AuthFlow::RefreshToken { token_url } => {
                if let Some(url) = &overrides.token_url {
                    *token_url = url.clone();
                }
            }
            AuthFlow::AuthorizationCode(settings) => {
                if let Some(url) = &overrides.token_url {
                    settings.token_url = url.clone();
                }
                if let Some(url) = &overrides.auth_url {
                    settings.auth_url = url.clone();
                }
                if let Some(port) = overrides.callback_port {
                    settings.callback_port = port;
                }
                if let Some(secs) = overrides.callback_timeout_secs {
                    settings.callback_timeout = Duration::from_secs(secs);
                }
                if let Some(scopes) = &overrides.scopes {
                    settings.scopes = scopes.clone();
                }
            }
            AuthFlow::OAuth1 | AuthFlow::Basic { .. } | AuthFlow::StaticToken { .. } => {}
        }
    }

    /// Non-secret summary for listings
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.to_string(),
            flow: self.flow.kind(),
            required_keys: self.required_keys(),
            header: self.placement.header.clone(),
            api_base_url: self.api_base_url.clone(),
            token_url: self.flow.token_url().map(str::to_string),
        }
    }
}

/// Serializable provider summary
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub flow: &'static str,
    pub required_keys: Vec<String>,
    pub header: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

/// Known providers by name
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderAuth>,
}

impl ProviderRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for provider in builtin_providers() {
            registry.register(provider);
        }
        registry
    }

    /// Add or replace a provider
    pub fn register(&mut self, provider: ProviderAuth) {
        self.providers
            .insert(provider.name.to_string(), provider);
    }

    pub fn get(&self, name: &str) -> AuthResult<&ProviderAuth> {
        self.providers
            .get(name)
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderAuth> {
        self.providers.values()
    }

    /// Apply per-provider overrides; unknown names are rejected
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, ProviderOverrides>,
    ) -> AuthResult<()> {
        for (name, provider_overrides) in overrides {
            let provider = self
                .providers
                .get_mut(name)
                .ok_or_else(|| AuthError::UnknownProvider(name.clone()))?;
            provider.apply(provider_overrides);
        }
        Ok(())
    }
}

fn static_token(provider: &'static str, token_key: &str) -> ProviderAuth {
    ProviderAuth::new(
        ProviderName::from_static(provider),
        AuthFlow::StaticToken {
            token_key: token_key.to_string(),
        },
    )
}

fn builtin_providers() -> Vec<ProviderAuth> {
    vec![
        ProviderAuth::new(
            ProviderName::from_static("spotify"),
            AuthFlow::ClientCredentials {
                token_url: "https://accounts.spotify.com/api/token".to_string(),
            },
        )
        .with_api_base_url("https://api.spotify.com/v1"),
        ProviderAuth::new(
            ProviderName::from_static("amazon-sp"),
            AuthFlow::RefreshToken {
                token_url: "https://api.amazon.com/auth/o2/token".to_string(),
            },
        )
        .with_placement(TokenPlacement::header("x-amz-access-token"))
        .with_api_base_url("https://sellingpartnerapi-na.amazon.com"),
        ProviderAuth::new(
            ProviderName::from_static("x"),
            AuthFlow::AuthorizationCode(
                PkceSettings::new(
                    "https://twitter.com/i/oauth2/authorize",
                    "https://api.twitter.com/2/oauth2/token",
                )
                .with_scopes(["tweet.read", "tweet.write", "users.read", "offline.access"]),
            ),
        )
        .with_api_base_url("https://api.twitter.com/2"),
        ProviderAuth::new(ProviderName::from_static("twitter"), AuthFlow::OAuth1)
            .with_api_base_url("https://api.twitter.com/1.1"),
        ProviderAuth::new(
            ProviderName::from_static("twilio"),
            AuthFlow::Basic {
                username_key: "account_sid".to_string(),
                password_key: "auth_token".to_string(),
            },
        )
        .with_api_base_url("https://api.twilio.com/2010-04-01"),
        static_token("discord", "bot_token")
            .with_placement(TokenPlacement::scheme("Bot"))
            .with_api_base_url("https://discord.com/api/v10"),
        static_token("vercel", "token").with_api_base_url("https://api.vercel.com"),
        static_token("cloudflare", "api_token")
            .with_api_base_url("https://api.cloudflare.com/client/v4"),
        static_token("dockerhub", "token").with_api_base_url("https://hub.docker.com/v2"),
        static_token("mastodon", "access_token"),
    ]
}
