//! Credential store command handlers

use crate::cli::commands::ConfigAction;
use crate::config::CliConfig;
use crate::error::{CliError, Result};
use pocket_sdk::CredentialStore;
use serde_json::{json, Map, Value};

/// Keys whose values are identifiers or metadata rather than secrets
const PLAIN_SUFFIXES: &[&str] = &[
    "_client_id",
    "_consumer_key",
    "_account_sid",
    "_token_expiry",
    "_token_scope",
];

pub async fn handle_config(action: ConfigAction, config: &CliConfig) -> Result<Value> {
    let store = config.credential_store()?;
    run(action, &store).await
}

/// Execute a config action against any credential store
pub async fn run(action: ConfigAction, store: &dyn CredentialStore) -> Result<Value> {
    match action {
        ConfigAction::Set { key, value } => {
            validate_key(&key)?;
            if value.is_empty() {
                return Err(CliError::invalid_argument(
                    "Value cannot be empty; use 'pocket config unset' to remove a key",
                ));
            }
            store.set(&key, &value).await?;
            Ok(json!({ "key": key, "stored": true }))
        }
        ConfigAction::Get { key } => {
            let value = store.must_get(&key).await?;
            Ok(json!({ "key": key, "value": value }))
        }
        ConfigAction::Unset { key } => {
            let removed = store.remove(&key).await?;
            Ok(json!({ "key": key, "removed": removed }))
        }
        ConfigAction::List => {
            let mut entries = Map::new();
            for key in store.keys().await? {
                if let Some(value) = store.get(&key).await? {
                    let shown = if is_secret(&key) { mask(&value) } else { value };
                    entries.insert(key, Value::String(shown));
                }
            }
            Ok(Value::Object(entries))
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CliError::invalid_argument(format!(
            "Invalid key '{}': use lowercase letters, digits and underscores, e.g. spotify_client_id",
            key
        )))
    }
}

fn is_secret(key: &str) -> bool {
    !PLAIN_SUFFIXES.iter().any(|suffix| key.ends_with(suffix))
}

/// Keep a short prefix so values can be told apart
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "****".to_string()
    } else {
        format!("{}****", chars[..4].iter().collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocket_sdk::MemoryCredentialStore;

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "****");
        assert_eq!(mask("sk_live_1234567890"), "sk_l****");
    }

    #[test]
    fn test_secret_detection() {
        assert!(is_secret("spotify_client_secret"));
        assert!(is_secret("amazon_sp_refresh_token"));
        assert!(is_secret("discord_bot_token"));
        assert!(!is_secret("spotify_client_id"));
        assert!(!is_secret("x_token_expiry"));
    }

    #[tokio::test]
    async fn test_set_get_unset() {
        let store = MemoryCredentialStore::new();

        let set = ConfigAction::Set {
            key: "vercel_token".into(),
            value: "vtok".into(),
        };
        assert_eq!(
            run(set, &store).await.unwrap(),
            json!({"key": "vercel_token", "stored": true})
        );

        let get = ConfigAction::Get {
            key: "vercel_token".into(),
        };
        assert_eq!(run(get, &store).await.unwrap()["value"], "vtok");

        let unset = ConfigAction::Unset {
            key: "vercel_token".into(),
        };
        assert_eq!(run(unset, &store).await.unwrap()["removed"], true);

        let get = ConfigAction::Get {
            key: "vercel_token".into(),
        };
        let err = run(get, &store).await.unwrap_err();
        assert_eq!(err.code(), "config_missing");
    }

    #[tokio::test]
    async fn test_list_masks_secrets() {
        let store = MemoryCredentialStore::with_entries([
            ("spotify_client_id", "abc123"),
            ("spotify_client_secret", "0123456789abcdef"),
        ]);

        let listed = run(ConfigAction::List, &store).await.unwrap();
        assert_eq!(
            listed,
            json!({
                "spotify_client_id": "abc123",
                "spotify_client_secret": "0123****",
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let store = MemoryCredentialStore::new();
        let set = ConfigAction::Set {
            key: "Spotify Client".into(),
            value: "x".into(),
        };
        let err = run(set, &store).await.unwrap_err();
        assert_eq!(err.code(), "invalid_argument");
    }
}
