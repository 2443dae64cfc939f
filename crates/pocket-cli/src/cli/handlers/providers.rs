use crate::config::CliConfig;
use crate::error::Result;
use serde_json::Value;

/// Built-in providers, with configured overrides applied
pub fn handle_providers(config: &CliConfig) -> Result<Value> {
    let providers: Vec<_> = config.registry()?.iter().map(|p| p.info()).collect();
    Ok(serde_json::to_value(providers)?)
}
