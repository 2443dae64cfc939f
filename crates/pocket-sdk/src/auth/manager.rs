//! Token acquisition for every provider flow
//!
//! The TokenManager owns the token cache and dispatches on the provider's
//! configured [`AuthFlow`]. For cached flows the per-provider lock is held
//! from the validity check until the new token is written, so concurrent
//! callers share one token request and a single-use refresh token is never
//! spent twice.

use super::cache::TokenCache;
use super::callback_server::CallbackServer;
use super::grants;
use super::launcher::BrowserLauncher;
use super::oauth1::OAuth1Credentials;
use super::pkce::PkceExchange;
use super::providers::{AuthFlow, ProviderAuth, ProviderRegistry};
use super::types::{AuthError, AuthResult, TokenState};
use crate::store::{keys, CredentialStore};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use pocket_common::{DEFAULT_HTTP_TIMEOUT, TOKEN_EXPIRY_MARGIN, USER_AGENT};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A single header to attach to a request
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub name: String,
    pub value: String,
    /// Cached access token the value was rendered from
    pub access_token: Option<String>,
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHeader")
            .field("name", &self.name)
            .field("value", &"[redacted]")
            .field("cached", &self.access_token.is_some())
            .finish()
    }
}

/// Secret-free view of a provider's credentials and tokens
#[derive(Debug, Clone, Serialize)]
pub struct TokenStatus {
    pub provider: String,
    pub flow: &'static str,
    pub configured: bool,
    pub missing_keys: Vec<String>,
    pub has_access_token: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
}

/// Acquires, caches and applies provider credentials
pub struct TokenManager {
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    cache: TokenCache,
    registry: ProviderRegistry,
}

impl TokenManager {
    /// Create a manager with the default HTTP client settings
    pub fn new(store: Arc<dyn CredentialStore>, registry: ProviderRegistry) -> AuthResult<Self> {
        Self::with_timeout(store, registry, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a manager whose token requests time out after `timeout`
    pub fn with_timeout(
        store: Arc<dyn CredentialStore>,
        registry: ProviderRegistry,
        timeout: Duration,
    ) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AuthError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http_client(http, store, registry))
    }

    /// Create a manager around an existing HTTP client
    pub fn with_http_client(
        http: reqwest::Client,
        store: Arc<dyn CredentialStore>,
        registry: ProviderRegistry,
    ) -> Self {
        Self {
            http,
            cache: TokenCache::new(Arc::clone(&store)),
            store,
            registry,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Get a valid access token, fetching a new one only when needed
    pub async fn acquire(&self, provider: &str) -> AuthResult<String> {
        let auth = self.registry.get(provider)?;
        if !auth.flow.uses_token_cache() {
            return Err(AuthError::UnsupportedFlow {
                provider: provider.to_string(),
                operation: "access tokens",
            });
        }

        let mut guard = self.cache.lock(&auth.name).await?;
        if let Some(state) = guard.valid() {
            debug!(provider, "Using cached token");
            return Ok(state.access_token.clone());
        }

        let state = self.fetch_token(auth, guard.state()).await?;
        let access_token = state.access_token.clone();
        guard.put(state).await?;
        info!(provider, "Obtained new access token");
        Ok(access_token)
    }

    async fn fetch_token(&self, auth: &ProviderAuth, current: &TokenState) -> AuthResult<TokenState> {
        match &auth.flow {
            AuthFlow::ClientCredentials { token_url } => {
                let values = self
                    .require(auth, &[keys::CLIENT_ID, keys::CLIENT_SECRET])
                    .await?;
                let response =
                    grants::client_credentials(&self.http, token_url, &values[0], &values[1])
                        .await?;
                Ok(response.into_token_state(None, Duration::ZERO))
            }
            AuthFlow::RefreshToken { token_url } => {
                let values = self
                    .require(
                        auth,
                        &[keys::CLIENT_ID, keys::CLIENT_SECRET, keys::REFRESH_TOKEN],
                    )
                    .await?;
                // A rotated token in memory wins over what the store held at startup.
                let refresh = current
                    .refresh_token
                    .clone()
                    .unwrap_or_else(|| values[2].clone());
                let response = grants::refresh_token(
                    &self.http,
                    token_url,
                    &values[0],
                    Some(values[1].as_str()),
                    &refresh,
                )
                .await?;
                Ok(response.into_token_state(Some(refresh), TOKEN_EXPIRY_MARGIN))
            }
            AuthFlow::AuthorizationCode(settings) => {
                let Some(refresh) = current.refresh_token.clone() else {
                    return Err(AuthError::ConfigMissing {
                        keys: vec![auth.key(keys::REFRESH_TOKEN)],
                        hint: format!("pocket auth login {}", auth.name),
                    });
                };
                let values = self.require(auth, &[keys::CLIENT_ID]).await?;
                let client_secret = self.store.get(&auth.key(keys::CLIENT_SECRET)).await?;
                let response = grants::refresh_token(
                    &self.http,
                    &settings.token_url,
                    &values[0],
                    client_secret.as_deref(),
                    &refresh,
                )
                .await?;
                Ok(response.into_token_state(Some(refresh), Duration::ZERO))
            }
            AuthFlow::OAuth1 | AuthFlow::Basic { .. } | AuthFlow::StaticToken { .. } => {
                Err(AuthError::UnsupportedFlow {
                    provider: auth.name.to_string(),
                    operation: "access tokens",
                })
            }
        }
    }

    /// Run the interactive authorization-code + PKCE login
    ///
    /// Binds the loopback listener first, then hands the authorization URL
    /// to `launcher` and waits for the redirect.
    pub async fn authorize(
        &self,
        provider: &str,
        launcher: &dyn BrowserLauncher,
    ) -> AuthResult<TokenStatus> {
        let auth = self.registry.get(provider)?;
        let AuthFlow::AuthorizationCode(settings) = &auth.flow else {
            return Err(AuthError::UnsupportedFlow {
                provider: provider.to_string(),
                operation: "interactive login",
            });
        };

        let values = self.require(auth, &[keys::CLIENT_ID]).await?;
        let client_id = &values[0];
        let client_secret = self.store.get(&auth.key(keys::CLIENT_SECRET)).await?;

        let server = CallbackServer::bind(
            settings.callback_port,
            settings.callback_path.clone(),
            settings.callback_timeout,
        )
        .await?;
        let redirect_uri = server.redirect_uri();

        let exchange = PkceExchange::generate();
        let auth_url = exchange.authorization_url(client_id, settings, &redirect_uri)?;

        info!(provider, "Waiting for authorization callback on {}", redirect_uri);
        if let Err(e) = launcher.open(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        let code = server.wait_for_code(&exchange.state).await?;
        let response = grants::exchange_code(
            &self.http,
            &settings.token_url,
            client_id,
            client_secret.as_deref(),
            &code,
            &redirect_uri,
            &exchange.code_verifier,
        )
        .await?;

        let state = response.into_token_state(None, Duration::ZERO);
        let mut guard = self.cache.lock(&auth.name).await?;
        guard.put(state).await?;
        info!(provider, "Login successful");

        self.status_of(auth, Some(guard.state())).await
    }

    /// Header authorizing a request to `url` under the provider's flow
    ///
    /// `form` is only used by OAuth 1.0a, which signs body parameters.
    pub async fn authorization(
        &self,
        provider: &str,
        method: &str,
        url: &str,
        form: &[(String, String)],
    ) -> AuthResult<AuthHeader> {
        let auth = self.registry.get(provider)?;
        let placement = &auth.placement;

        match &auth.flow {
            AuthFlow::ClientCredentials { .. }
            | AuthFlow::RefreshToken { .. }
            | AuthFlow::AuthorizationCode(_) => {
                let token = self.acquire(provider).await?;
                Ok(AuthHeader {
                    name: placement.header.clone(),
                    value: placement.render(&token),
                    access_token: Some(token),
                })
            }
            AuthFlow::OAuth1 => {
                let values = self
                    .require(
                        auth,
                        &[
                            keys::CONSUMER_KEY,
                            keys::CONSUMER_SECRET,
                            keys::ACCESS_TOKEN,
                            keys::ACCESS_SECRET,
                        ],
                    )
                    .await?;
                let [consumer_key, consumer_secret, access_token, access_secret] =
                    <[String; 4]>::try_from(values).map_err(|_| {
                        AuthError::StorageError("Unexpected credential count".to_string())
                    })?;
                let credentials = OAuth1Credentials::new(
                    consumer_key,
                    consumer_secret,
                    access_token,
                    access_secret,
                );
                Ok(AuthHeader {
                    name: "Authorization".to_string(),
                    value: credentials.authorization_header(method, url, form)?,
                    access_token: None,
                })
            }
            AuthFlow::Basic {
                username_key,
                password_key,
            } => {
                let values = self
                    .require(auth, &[username_key.as_str(), password_key.as_str()])
                    .await?;
                let encoded = STANDARD.encode(format!("{}:{}", values[0], values[1]));
                Ok(AuthHeader {
                    name: "Authorization".to_string(),
                    value: format!("Basic {}", encoded),
                    access_token: None,
                })
            }
            AuthFlow::StaticToken { token_key } => {
                let values = self.require(auth, &[token_key.as_str()]).await?;
                Ok(AuthHeader {
                    name: placement.header.clone(),
                    value: placement.render(&values[0]),
                    access_token: None,
                })
            }
        }
    }

    /// Drop the cached access token after the provider rejected it
    pub async fn invalidate(&self, provider: &str) -> AuthResult<()> {
        let auth = self.registry.get(provider)?;
        if auth.flow.uses_token_cache() {
            self.cache.invalidate(&auth.name).await?;
            info!(provider, "Cached access token invalidated");
        } else {
            debug!(provider, "Nothing cached to invalidate");
        }
        Ok(())
    }

    /// Drop the cached access token only if it is the one the provider rejected
    ///
    /// A 401 for a token that a concurrent caller has since replaced leaves
    /// the newer token in place. Returns whether anything was invalidated.
    pub async fn invalidate_rejected(&self, provider: &str, rejected: &str) -> AuthResult<bool> {
        let auth = self.registry.get(provider)?;
        if !auth.flow.uses_token_cache() {
            return Ok(false);
        }
        let mut guard = self.cache.lock(&auth.name).await?;
        let invalidated = guard.invalidate_if_current(rejected).await?;
        if invalidated {
            info!(provider, "Cached access token invalidated");
        }
        Ok(invalidated)
    }

    /// Report configuration and token state without exposing secrets
    pub async fn status(&self, provider: &str) -> AuthResult<TokenStatus> {
        let auth = self.registry.get(provider)?;
        if auth.flow.uses_token_cache() {
            let guard = self.cache.lock(&auth.name).await?;
            self.status_of(auth, Some(guard.state())).await
        } else {
            self.status_of(auth, None).await
        }
    }

    /// Remove tokens this process derived for the provider
    ///
    /// User-supplied secrets stay; a configured refresh token (refresh-token
    /// flow) is kept as well since it cannot be recreated by logging in.
    pub async fn logout(&self, provider: &str) -> AuthResult<()> {
        let auth = self.registry.get(provider)?;
        match &auth.flow {
            AuthFlow::ClientCredentials { .. } | AuthFlow::AuthorizationCode(_) => {
                self.cache.clear(&auth.name).await
            }
            AuthFlow::RefreshToken { .. } => self.cache.invalidate(&auth.name).await,
            AuthFlow::OAuth1 | AuthFlow::Basic { .. } | AuthFlow::StaticToken { .. } => {
                Err(AuthError::UnsupportedFlow {
                    provider: provider.to_string(),
                    operation: "logout; remove its keys with 'pocket config unset'",
                })
            }
        }
    }

    async fn status_of(
        &self,
        auth: &ProviderAuth,
        state: Option<&TokenState>,
    ) -> AuthResult<TokenStatus> {
        let mut missing_keys = Vec::new();
        for key in auth.required_keys() {
            if self.store.get(&key).await?.is_none() {
                missing_keys.push(key);
            }
        }
        let configured = missing_keys.is_empty();

        let status = match state {
            Some(state) => TokenStatus {
                provider: auth.name.to_string(),
                flow: auth.flow.kind(),
                configured,
                missing_keys,
                has_access_token: !state.access_token.is_empty(),
                valid: state.is_valid(),
                expires_at: Some(state.expires_at).filter(|_| !state.access_token.is_empty()),
                has_refresh_token: state.refresh_token.is_some(),
            },
            None => TokenStatus {
                provider: auth.name.to_string(),
                flow: auth.flow.kind(),
                configured,
                missing_keys,
                has_access_token: false,
                valid: configured,
                expires_at: None,
                has_refresh_token: false,
            },
        };
        Ok(status)
    }

    /// Read required keys in order, reporting every missing one at once
    async fn require(&self, auth: &ProviderAuth, suffixes: &[&str]) -> AuthResult<Vec<String>> {
        let mut values = Vec::with_capacity(suffixes.len());
        let mut missing = Vec::new();
        for suffix in suffixes {
            let key = auth.key(suffix);
            match self.store.get(&key).await? {
                Some(value) => values.push(value),
                None => missing.push(key),
            }
        }
        if missing.is_empty() {
            Ok(values)
        } else {
            Err(AuthError::config_missing(missing))
        }
    }
}
