//! Configuration management for the pocket CLI
//!
//! Sources, lowest priority first:
//! 1. Built-in defaults
//! 2. `config.toml` (the `--config` path, or `<config_dir>/pocket/config.toml`)
//! 3. `POCKET_*` environment variables, `__` separating nested keys
//!    (e.g. `POCKET_PROVIDERS__SPOTIFY__TOKEN_URL`)
//!
//! Credentials never live here; they belong to the credential store.

use crate::error::Result;
use etcetera::{choose_base_strategy, BaseStrategy};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use pocket_common::{
    ConfigurationError, APP_NAME, DEFAULT_CALLBACK_TIMEOUT, DEFAULT_HTTP_TIMEOUT, ENV_PREFIX,
};
use pocket_sdk::auth::ProviderOverrides;
use pocket_sdk::{AuthFlow, FileCredentialStore, ProviderRegistry, TokenManager};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// CLI configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CliConfig {
    pub http: HttpConfig,

    pub auth: AuthConfig,

    pub store: StoreConfig,

    /// Endpoint overrides keyed by provider name
    pub providers: BTreeMap<String, ProviderOverrides>,
}

/// Outgoing HTTP settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
        }
    }
}

/// Interactive login settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long `auth login` waits for the browser redirect
    pub callback_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            callback_timeout_secs: DEFAULT_CALLBACK_TIMEOUT.as_secs(),
        }
    }
}

/// Credential store location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Overrides `<data_dir>/pocket/credentials.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CliConfig {
    /// Load configuration, reading `path` or the default config file if present
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, ConfigurationError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if path.exists() {
            debug!("Loading configuration from: {}", path.display());
            figment = figment.merge(Toml::file(&path));
        } else {
            debug!("Configuration file not found, using defaults: {}", path.display());
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigurationError::ParseError {
                details: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.http.timeout_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "http.timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.auth.callback_timeout_secs == 0 {
            return Err(ConfigurationError::invalid_value(
                "auth.callback_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Get configuration directory
    pub fn config_dir() -> std::result::Result<PathBuf, ConfigurationError> {
        let strategy = choose_base_strategy()
            .map_err(|e| ConfigurationError::Directories(e.to_string()))?;
        Ok(strategy.config_dir().join(APP_NAME))
    }

    pub fn default_path() -> std::result::Result<PathBuf, ConfigurationError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    /// Built-in providers with the configured overrides applied
    ///
    /// The global callback timeout applies to every interactive provider
    /// that does not set its own.
    pub fn registry(&self) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::builtin();
        let mut overrides = self.providers.clone();

        let interactive: Vec<String> = registry
            .iter()
            .filter(|p| matches!(p.flow, AuthFlow::AuthorizationCode(_)))
            .map(|p| p.name.to_string())
            .collect();
        for name in interactive {
            overrides
                .entry(name)
                .or_default()
                .callback_timeout_secs
                .get_or_insert(self.auth.callback_timeout_secs);
        }

        registry.apply_overrides(&overrides)?;
        Ok(registry)
    }

    pub fn credential_store(&self) -> Result<FileCredentialStore> {
        match &self.store.path {
            Some(path) => Ok(FileCredentialStore::new(path)),
            None => Ok(FileCredentialStore::at_default_path()?),
        }
    }

    pub fn token_manager(&self) -> Result<TokenManager> {
        let store = Arc::new(self.credential_store()?);
        Ok(TokenManager::with_timeout(
            store,
            self.registry()?,
            self.http_timeout(),
        )?)
    }
}
