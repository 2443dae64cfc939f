//! Constants shared by the SDK and the CLI

use std::time::Duration;

/// Application name used for config/data directories
pub const APP_NAME: &str = "pocket";

/// User agent sent with every outgoing request
pub const USER_AGENT: &str = concat!("pocket/", env!("CARGO_PKG_VERSION"));

/// Default timeout applied to every HTTP request
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the interactive authorization flow waits for the browser redirect
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Loopback port used for the OAuth redirect listener
pub const DEFAULT_CALLBACK_PORT: u16 = 8765;

/// Tokens this close to expiry are treated as already expired
pub const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "POCKET_";
