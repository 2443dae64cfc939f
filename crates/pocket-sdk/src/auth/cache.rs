//! Per-provider token cache
//!
//! Each provider gets its own async mutex. Holding a [`TokenGuard`] is the
//! only way to read or replace a provider's [`TokenState`], so a
//! check → refresh → write sequence can never interleave with another one
//! for the same provider. Different providers never block each other.

use super::types::{AuthResult, TokenState};
use crate::store::{keys, CredentialStore};
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use pocket_common::ProviderName;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Slot {
    hydrated: bool,
    state: TokenState,
}

/// In-memory token cache writing through to a [`CredentialStore`]
pub struct TokenCache {
    store: Arc<dyn CredentialStore>,
    slots: DashMap<ProviderName, Arc<Mutex<Slot>>>,
}

impl TokenCache {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            slots: DashMap::new(),
        }
    }

    /// Lock a provider's slot, loading persisted tokens on first use
    pub async fn lock(&self, provider: &ProviderName) -> AuthResult<TokenGuard> {
        let slot = self.slots.entry(provider.clone()).or_default().clone();
        let mut guard = slot.lock_owned().await;

        if !guard.hydrated {
            guard.state = load_state(self.store.as_ref(), provider).await?;
            guard.hydrated = true;
        }

        Ok(TokenGuard {
            provider: provider.clone(),
            store: Arc::clone(&self.store),
            slot: guard,
        })
    }

    /// Cached state if its access token is still valid
    pub async fn get(&self, provider: &ProviderName) -> AuthResult<Option<TokenState>> {
        Ok(self.lock(provider).await?.valid().cloned())
    }

    /// Replace the cached state and persist it
    pub async fn put(&self, provider: &ProviderName, state: TokenState) -> AuthResult<()> {
        self.lock(provider).await?.put(state).await
    }

    /// Drop the access token, keeping the refresh token
    pub async fn invalidate(&self, provider: &ProviderName) -> AuthResult<()> {
        self.lock(provider).await?.invalidate().await
    }

    /// Drop every token held for the provider
    pub async fn clear(&self, provider: &ProviderName) -> AuthResult<()> {
        self.lock(provider).await?.clear().await
    }
}

/// Exclusive access to one provider's token state
pub struct TokenGuard {
    provider: ProviderName,
    store: Arc<dyn CredentialStore>,
    slot: OwnedMutexGuard<Slot>,
}

impl TokenGuard {
    pub fn provider(&self) -> &ProviderName {
        &self.provider
    }

    pub fn state(&self) -> &TokenState {
        &self.slot.state
    }

    /// The state if its access token is usable right now
    pub fn valid(&self) -> Option<&TokenState> {
        Some(&self.slot.state).filter(|state| state.is_valid())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.slot.state.refresh_token.as_deref()
    }

    /// Replace the state and write it through to the store
    pub async fn put(&mut self, state: TokenState) -> AuthResult<()> {
        let mut entries = vec![
            (
                self.provider.key(keys::ACCESS_TOKEN),
                state.access_token.clone(),
            ),
            (
                self.provider.key(keys::TOKEN_EXPIRY),
                state.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ];
        let mut stale = Vec::new();
        match &state.refresh_token {
            Some(refresh) => {
                entries.push((self.provider.key(keys::REFRESH_TOKEN), refresh.clone()))
            }
            None => stale.push(self.provider.key(keys::REFRESH_TOKEN)),
        }
        match &state.scope {
            Some(scope) => {
                entries.push((self.provider.key(keys::TOKEN_SCOPE), scope.clone()))
            }
            None => stale.push(self.provider.key(keys::TOKEN_SCOPE)),
        }

        self.slot.state = state;
        self.store.set_many(&entries).await?;
        // The store must never hold a refresh token the slot has dropped.
        self.store.remove_many(&stale).await?;
        debug!(provider = %self.provider, "Stored token");
        Ok(())
    }

    /// Drop the access token but keep the refresh token
    pub async fn invalidate(&mut self) -> AuthResult<()> {
        self.slot.state.invalidate();
        self.store
            .remove_many(&[
                self.provider.key(keys::ACCESS_TOKEN),
                self.provider.key(keys::TOKEN_EXPIRY),
            ])
            .await?;
        debug!(provider = %self.provider, "Invalidated access token");
        Ok(())
    }

    /// Invalidate only if `rejected` is still the cached access token
    ///
    /// Returns false when another caller already replaced it.
    pub async fn invalidate_if_current(&mut self, rejected: &str) -> AuthResult<bool> {
        if self.slot.state.access_token.is_empty() || self.slot.state.access_token != rejected {
            debug!(provider = %self.provider, "Rejected token is no longer cached");
            return Ok(false);
        }
        self.invalidate().await?;
        Ok(true)
    }

    /// Drop access and refresh tokens
    pub async fn clear(&mut self) -> AuthResult<()> {
        self.slot.state = TokenState::default();
        self.store
            .remove_many(&[
                self.provider.key(keys::ACCESS_TOKEN),
                self.provider.key(keys::TOKEN_EXPIRY),
                self.provider.key(keys::REFRESH_TOKEN),
                self.provider.key(keys::TOKEN_SCOPE),
            ])
            .await
    }
}

async fn load_state(store: &dyn CredentialStore, provider: &ProviderName) -> AuthResult<TokenState> {
    let access_token = store
        .get(&provider.key(keys::ACCESS_TOKEN))
        .await?
        .unwrap_or_default();
    let refresh_token = store.get(&provider.key(keys::REFRESH_TOKEN)).await?;
    let scope = store.get(&provider.key(keys::TOKEN_SCOPE)).await?;

    let expires_at = match store.get(&provider.key(keys::TOKEN_EXPIRY)).await? {
        Some(raw) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!(provider = %provider, "Ignoring unparseable token expiry: {}", e);
                DateTime::<Utc>::MIN_UTC
            }
        },
        None => DateTime::<Utc>::MIN_UTC,
    };

    Ok(TokenState {
        access_token,
        refresh_token,
        expires_at,
        scope,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use chrono::Duration;

    fn provider(name: &str) -> ProviderName {
        ProviderName::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_put_writes_through() {
        let store = Arc::new(MemoryCredentialStore::new());
        let cache = TokenCache::new(store.clone());
        let amazon = provider("amazon-sp");

        let expires_at = Utc::now() + Duration::hours(1);
        let state = TokenState::new("Atza|1", Some("Atzr|1".into()), expires_at);
        cache.put(&amazon, state.clone()).await.unwrap();

        assert_eq!(
            store.get("amazon_sp_access_token").await.unwrap().as_deref(),
            Some("Atza|1")
        );
        assert_eq!(
            store.get("amazon_sp_refresh_token").await.unwrap().as_deref(),
            Some("Atzr|1")
        );
        let persisted = store.get("amazon_sp_token_expiry").await.unwrap().unwrap();
        let parsed = DateTime::parse_from_rfc3339(&persisted).unwrap();
        assert_eq!(parsed.timestamp(), expires_at.timestamp());

        assert_eq!(
            cache.get(&amazon).await.unwrap().map(|s| s.access_token),
            Some("Atza|1".to_string())
        );
    }

    #[tokio::test]
    async fn test_hydrates_from_store() {
        let expiry = (Utc::now() + Duration::hours(1)).to_rfc3339();
        let store = Arc::new(MemoryCredentialStore::with_entries([
            ("x_access_token", "persisted"),
            ("x_refresh_token", "refresh"),
            ("x_token_expiry", expiry.as_str()),
        ]));
        let cache = TokenCache::new(store);

        let state = cache.get(&provider("x")).await.unwrap().unwrap();
        assert_eq!(state.access_token, "persisted");
        assert_eq!(state.refresh_token.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_expired_or_malformed_expiry_is_not_served() {
        let store = Arc::new(MemoryCredentialStore::with_entries([
            ("spotify_access_token", "stale"),
            ("spotify_token_expiry", "not-a-date"),
        ]));
        let cache = TokenCache::new(store);
        assert!(cache.get(&provider("spotify")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_keeps_refresh_token() {
        let store = Arc::new(MemoryCredentialStore::new());
        let cache = TokenCache::new(store.clone());
        let x = provider("x");

        let state = TokenState::new("A1", Some("R1".into()), Utc::now() + Duration::hours(2));
        cache.put(&x, state).await.unwrap();
        cache.invalidate(&x).await.unwrap();

        assert!(cache.get(&x).await.unwrap().is_none());
        assert_eq!(store.get("x_access_token").await.unwrap(), None);
        assert_eq!(
            store.get("x_refresh_token").await.unwrap().as_deref(),
            Some("R1")
        );

        let guard = cache.lock(&x).await.unwrap();
        assert_eq!(guard.refresh_token(), Some("R1"));
    }

    #[tokio::test]
    async fn test_put_without_refresh_token_drops_stale_one() {
        let store = Arc::new(MemoryCredentialStore::new());
        let cache = TokenCache::new(store.clone());
        let x = provider("x");

        let mut first = TokenState::new("A1", Some("R1".into()), Utc::now() + Duration::hours(2));
        first.scope = Some("tweet.read".into());
        cache.put(&x, first).await.unwrap();

        let second = TokenState::new("A2", None, Utc::now() + Duration::hours(2));
        cache.put(&x, second).await.unwrap();

        assert_eq!(store.get("x_refresh_token").await.unwrap(), None);
        assert_eq!(store.get("x_token_scope").await.unwrap(), None);
        assert_eq!(
            store.get("x_access_token").await.unwrap().as_deref(),
            Some("A2")
        );

        // A later process sees the same state as this one.
        let reloaded = TokenCache::new(store);
        assert_eq!(reloaded.lock(&x).await.unwrap().refresh_token(), None);
    }

    #[tokio::test]
    async fn test_invalidate_if_current_spares_newer_token() {
        let store = Arc::new(MemoryCredentialStore::new());
        let cache = TokenCache::new(store.clone());
        let spotify = provider("spotify");

        let state = TokenState::new("T2", None, Utc::now() + Duration::hours(1));
        cache.put(&spotify, state).await.unwrap();

        let mut guard = cache.lock(&spotify).await.unwrap();
        assert!(!guard.invalidate_if_current("T1").await.unwrap());
        assert_eq!(guard.valid().map(|s| s.access_token.as_str()), Some("T2"));
        assert_eq!(
            store.get("spotify_access_token").await.unwrap().as_deref(),
            Some("T2")
        );

        assert!(guard.invalidate_if_current("T2").await.unwrap());
        assert!(guard.valid().is_none());
        assert_eq!(store.get("spotify_access_token").await.unwrap(), None);
        assert!(!guard.invalidate_if_current("").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = Arc::new(MemoryCredentialStore::with_entries([("x_client_id", "cid")]));
        let cache = TokenCache::new(store.clone());
        let x = provider("x");

        let state = TokenState::new("A1", Some("R1".into()), Utc::now() + Duration::hours(2));
        cache.put(&x, state).await.unwrap();
        cache.clear(&x).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["x_client_id"]);
        assert!(cache.lock(&x).await.unwrap().state().is_empty());
    }

    #[tokio::test]
    async fn test_lock_serializes_same_provider() {
        let cache = Arc::new(TokenCache::new(Arc::new(MemoryCredentialStore::new())));
        let spotify = provider("spotify");

        let guard = cache.lock(&spotify).await.unwrap();

        let other = {
            let cache = Arc::clone(&cache);
            let spotify = spotify.clone();
            tokio::spawn(async move { cache.lock(&spotify).await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        assert!(!other.is_finished());

        // Other providers are not blocked.
        cache.lock(&provider("vercel")).await.unwrap();

        drop(guard);
        other.await.unwrap().unwrap();
    }
}
