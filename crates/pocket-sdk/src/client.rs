//! Authenticated request execution
//!
//! [`ApiClient`] performs one HTTP request with exactly one auth header
//! applied and classifies the response:
//!
//! - 2xx: raw body returned to the caller
//! - 429: [`ApiError::RateLimited`] with the provider's retry-after, never retried here
//! - 401: [`ApiError::AuthExpired`], and the cached token the request sent is invalidated
//! - 403: [`ApiError::Forbidden`]
//! - 404: [`ApiError::NotFound`]
//! - anything else: [`ApiError::Api`] with the provider's error envelope message
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pocket_sdk::{
//!     ApiClient, AuthStrategy, FileCredentialStore, ProviderRegistry, TokenManager,
//! };
//! use reqwest::Method;
//! use std::sync::Arc;
//!
//! # async fn example() -> pocket_sdk::Result<()> {
//! let store = Arc::new(FileCredentialStore::at_default_path()?);
//! let manager = Arc::new(TokenManager::new(store, ProviderRegistry::builtin())?);
//!
//! let client = ApiClient::builder()
//!     .base_url("https://api.spotify.com/v1")
//!     .token_manager(manager)
//!     .build()?;
//!
//! let body = client
//!     .execute(
//!         Method::GET,
//!         "/search?q=daft%20punk&type=artist",
//!         None,
//!         &AuthStrategy::Provider("spotify".into()),
//!     )
//!     .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

use crate::auth::{OAuth1Credentials, TokenManager};
use crate::envelope;
use crate::error::{ApiError, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use pocket_common::{DEFAULT_HTTP_TIMEOUT, USER_AGENT};
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How a request is authenticated
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Resolve the header through the token manager for this provider
    Provider(String),
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Basic <base64>`
    Basic { username: String, password: String },
    /// `Authorization: OAuth ...`, signed per request
    OAuth1(OAuth1Credentials),
    /// Arbitrary header, e.g. `x-amz-access-token`
    Header { name: String, value: String },
    /// Unauthenticated
    None,
}

/// Request body
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// HTTP client applying provider auth and classifying responses
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Option<String>,
    token_manager: Option<Arc<TokenManager>>,
}

impl ApiClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn token_manager(&self) -> Option<&Arc<TokenManager>> {
        self.token_manager.as_ref()
    }

    /// Absolute URL for `url`, joining relative paths to the base URL
    pub fn resolve_url(&self, url: &str) -> Result<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            )),
            None => Err(ApiError::InvalidRequest {
                message: format!("Relative URL '{}' requires a base URL", url),
            }),
        }
    }

    /// Perform one request and return the raw response body on success
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        auth: &AuthStrategy,
    ) -> Result<Bytes> {
        let url = self.resolve_url(url)?;
        debug!("{} {}", method, url);

        let form: &[(String, String)] = match &body {
            Some(RequestBody::Form(params)) => params,
            _ => &[],
        };
        let request = self.http.request(method.clone(), &url);
        let (request, sent_token) = self.apply_auth(request, &method, &url, form, auth).await?;
        let request = match &body {
            Some(RequestBody::Json(value)) => request.json(value),
            Some(RequestBody::Form(params)) => request.form(params),
            None => request,
        };

        let response = request.send().await.map_err(ApiError::HttpClient)?;
        self.handle_response(response, auth, sent_token.as_deref()).await
    }

    /// Perform one request and decode the JSON response body
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        auth: &AuthStrategy,
    ) -> Result<T> {
        let bytes = self.execute(method, url, body, auth).await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
    }

    /// Attach the auth header, returning the cached token it carries, if any
    async fn apply_auth(
        &self,
        request: RequestBuilder,
        method: &Method,
        url: &str,
        form: &[(String, String)],
        auth: &AuthStrategy,
    ) -> Result<(RequestBuilder, Option<String>)> {
        let request = match auth {
            AuthStrategy::Provider(provider) => {
                let manager = self.token_manager.as_ref().ok_or_else(|| {
                    ApiError::InvalidRequest {
                        message: format!(
                            "Provider auth for '{}' requires a token manager",
                            provider
                        ),
                    }
                })?;
                let header = manager
                    .authorization(provider, method.as_str(), url, form)
                    .await?;
                return Ok((
                    request.header(header.name, header.value),
                    header.access_token,
                ));
            }
            AuthStrategy::Bearer(token) => request.bearer_auth(token),
            AuthStrategy::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            AuthStrategy::OAuth1(credentials) => request.header(
                AUTHORIZATION,
                credentials.authorization_header(method.as_str(), url, form)?,
            ),
            AuthStrategy::Header { name, value } => request.header(name.as_str(), value.as_str()),
            AuthStrategy::None => request,
        };
        Ok((request, None))
    }

    async fn handle_response(
        &self,
        response: Response,
        auth: &AuthStrategy,
        sent_token: Option<&str>,
    ) -> Result<Bytes> {
        let status = response.status();
        if status.is_success() {
            return response.bytes().await.map_err(ApiError::HttpClient);
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.unwrap_or_default();
        let provider_message = envelope::provider_message(status, &body);
        debug!("Request failed with status {}", status);

        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited {
                retry_after_secs: retry_after(&headers, &body),
                message: provider_message.message,
            }),
            StatusCode::UNAUTHORIZED => {
                let provider = match auth {
                    AuthStrategy::Provider(provider) => {
                        if let (Some(manager), Some(token)) = (&self.token_manager, sent_token) {
                            if let Err(e) = manager.invalidate_rejected(provider, token).await {
                                warn!("Failed to invalidate token for {}: {}", provider, e);
                            }
                        }
                        Some(provider.clone())
                    }
                    _ => None,
                };
                Err(ApiError::AuthExpired {
                    provider,
                    message: provider_message.message,
                })
            }
            StatusCode::FORBIDDEN => Err(ApiError::Forbidden {
                code: provider_message.code,
                message: provider_message.message,
            }),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound {
                message: provider_message.message,
            }),
            _ => Err(ApiError::Api {
                status: status.as_u16(),
                code: provider_message.code,
                message: provider_message.message,
            }),
        }
    }
}

/// Seconds to wait before retrying a throttled request
///
/// Checks `Retry-After` (delta-seconds or HTTP-date), then
/// `x-rate-limit-reset` (epoch seconds), then a JSON `retry_after` /
/// `retryAfter` body field.
pub fn retry_after(headers: &HeaderMap, body: &[u8]) -> Option<u64> {
    let now = Utc::now();

    if let Some(value) = header_str(headers, RETRY_AFTER.as_str()) {
        if let Ok(secs) = value.parse::<u64>() {
            return Some(secs);
        }
        if let Ok(date) = DateTime::parse_from_rfc2822(value) {
            let delta = (date.with_timezone(&Utc) - now).num_seconds();
            return u64::try_from(delta.max(0)).ok();
        }
    }

    if let Some(reset) = header_str(headers, "x-rate-limit-reset").and_then(|v| v.parse::<i64>().ok())
    {
        return u64::try_from((reset - now.timestamp()).max(0)).ok();
    }

    let value: Value = serde_json::from_slice(body).ok()?;
    ["retry_after", "retryAfter"]
        .iter()
        .find_map(|field| value.get(*field)?.as_f64())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.ceil() as u64)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

/// Builder for constructing an [`ApiClient`]
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    token_manager: Option<Arc<TokenManager>>,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL for relative request paths
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout (default 30 seconds)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Token manager used by [`AuthStrategy::Provider`]
    pub fn token_manager(mut self, manager: Arc<TokenManager>) -> Self {
        self.token_manager = Some(manager);
        self
    }

    /// Use a preconfigured HTTP client; timeout settings are then ignored
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient> {
        let http = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = reqwest::Client::builder()
                    .timeout(self.timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT))
                    .user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT));
                if let Some(connect_timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(connect_timeout);
                }
                builder.build().map_err(ApiError::HttpClient)?
            }
        };

        Ok(ApiClient {
            http,
            base_url: self.base_url,
            token_manager: self.token_manager,
        })
    }
}
