//! Credential storage
//!
//! A flat key/value namespace holding user-supplied secrets (client IDs,
//! client secrets, API tokens) and the tokens derived from them. Provider
//! keys follow `<provider>_<suffix>`, see [`keys`].

use crate::auth::{AuthError, AuthResult};
use async_trait::async_trait;
use etcetera::{choose_base_strategy, BaseStrategy};
use pocket_common::APP_NAME;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Key suffixes used in the provider key layout
pub mod keys {
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const TOKEN_EXPIRY: &str = "token_expiry";
    pub const TOKEN_SCOPE: &str = "token_scope";
    pub const CONSUMER_KEY: &str = "consumer_key";
    pub const CONSUMER_SECRET: &str = "consumer_secret";
    pub const ACCESS_SECRET: &str = "access_secret";
}

/// Durable key/value storage for credentials and tokens
///
/// Empty values are treated the same as missing ones.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Get a value, `None` if unset
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Set a value
    async fn set(&self, key: &str, value: &str) -> AuthResult<()>;

    /// Remove a value, returning whether it existed
    async fn remove(&self, key: &str) -> AuthResult<bool>;

    /// All stored keys, sorted
    async fn keys(&self) -> AuthResult<Vec<String>>;

    /// Set several values
    async fn set_many(&self, entries: &[(String, String)]) -> AuthResult<()> {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Remove several values
    async fn remove_many(&self, keys: &[String]) -> AuthResult<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }

    /// Get a value that must be configured
    async fn must_get(&self, key: &str) -> AuthResult<String> {
        self.get(key)
            .await?
            .ok_or_else(|| AuthError::config_missing(vec![key.to_string()]))
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// JSON file backed store
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename. On unix the file is readable by the owner only.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Create a store at a specific path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Create a store at the default location
    pub fn at_default_path() -> AuthResult<Self> {
        Ok(Self::new(Self::default_path()?))
    }

    /// Default location (e.g. `~/.local/share/pocket/credentials.json` on Linux)
    pub fn default_path() -> AuthResult<PathBuf> {
        let strategy = choose_base_strategy().map_err(|e| {
            AuthError::ConfigError(format!("Failed to determine base directories: {}", e))
        })?;
        Ok(strategy.data_dir().join(APP_NAME).join("credentials.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> AuthResult<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AuthError::StorageError(format!(
                    "Corrupt credential file {}: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(AuthError::StorageError(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Saved {} credential entries", entries.len());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let _guard = self.lock.lock().await;
        let entries = self.load().await?;
        Ok(non_empty(entries.get(key)))
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.set_many(&[(key.to_string(), value.to_string())])
            .await
    }

    async fn remove(&self, key: &str) -> AuthResult<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let existed = entries.remove(key).is_some();
        if existed {
            self.save(&entries).await?;
        }
        Ok(existed)
    }

    async fn keys(&self) -> AuthResult<Vec<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_keys().collect())
    }

    async fn set_many(&self, updates: &[(String, String)]) -> AuthResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        for (key, value) in updates {
            entries.insert(key.clone(), value.clone());
        }
        self.save(&entries).await
    }

    async fn remove_many(&self, keys: &[String]) -> AuthResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        for key in keys {
            entries.remove(key);
        }
        if entries.len() != before {
            self.save(&entries).await?;
        }
        Ok(())
    }
}

/// In-memory store, used by tests and embedders
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(non_empty(self.entries.read().await.get(key)))
    }

    async fn set(&self, key: &str, value: &str) -> AuthResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> AuthResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> AuthResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
