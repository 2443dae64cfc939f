//! Authentication command handlers

use crate::cli::commands::AuthAction;
use crate::config::CliConfig;
use crate::error::Result;
use crate::launcher::TerminalLauncher;
use crate::output::print_info;
use pocket_sdk::TokenManager;
use serde_json::{json, Value};
use tracing::debug;

pub async fn handle_auth(action: AuthAction, config: &CliConfig) -> Result<Value> {
    let manager = config.token_manager()?;
    match action {
        AuthAction::Login { provider } => handle_login(&manager, &provider).await,
        AuthAction::Token { provider } => handle_token(&manager, &provider).await,
        AuthAction::Status { provider } => handle_status(&manager, provider.as_deref()).await,
        AuthAction::Logout { provider } => handle_logout(&manager, &provider).await,
    }
}

/// Handle login command
pub async fn handle_login(manager: &TokenManager, provider: &str) -> Result<Value> {
    debug!("Starting login for {}", provider);
    let status = manager.authorize(provider, &TerminalLauncher).await?;
    print_info(&format!("Logged in to {}", provider));
    Ok(serde_json::to_value(status)?)
}

pub async fn handle_token(manager: &TokenManager, provider: &str) -> Result<Value> {
    let access_token = manager.acquire(provider).await?;
    let status = manager.status(provider).await?;
    Ok(json!({
        "provider": provider,
        "access_token": access_token,
        "expires_at": status.expires_at,
    }))
}

/// Status of one provider, or of every registered provider
pub async fn handle_status(manager: &TokenManager, provider: Option<&str>) -> Result<Value> {
    match provider {
        Some(provider) => Ok(serde_json::to_value(manager.status(provider).await?)?),
        None => {
            let names: Vec<String> = manager
                .registry()
                .iter()
                .map(|p| p.name.to_string())
                .collect();
            let mut statuses = Vec::with_capacity(names.len());
            for name in &names {
                statuses.push(manager.status(name).await?);
            }
            Ok(serde_json::to_value(statuses)?)
        }
    }
}

pub async fn handle_logout(manager: &TokenManager, provider: &str) -> Result<Value> {
    manager.logout(provider).await?;
    Ok(json!({ "provider": provider, "logged_out": true }))
}
