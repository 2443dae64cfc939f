use clap::Subcommand;

/// Main CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in, inspect and drop provider tokens
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Manage stored credentials
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Send an authenticated request to a provider
    Api(ApiArgs),

    /// List built-in providers and the credentials they need
    Providers,
}

/// Token lifecycle actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Run the browser login (authorization code + PKCE)
    Login {
        /// Provider name, e.g. `x`
        provider: String,
    },

    /// Print a valid access token, fetching a new one if needed
    Token { provider: String },

    /// Show token state without revealing secrets
    Status {
        /// Omit to report every provider
        provider: Option<String>,
    },

    /// Remove persisted tokens; configured secrets are kept
    Logout { provider: String },
}

/// Credential store actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Store a credential, e.g. `spotify_client_id`
    Set { key: String, value: String },

    /// Print a stored value
    Get { key: String },

    /// Delete a stored value
    Unset { key: String },

    /// List stored keys with secrets masked
    List,
}

/// Arguments of `pocket api`
#[derive(clap::Args, Debug, Clone)]
pub struct ApiArgs {
    /// Provider whose credentials authorize the request
    pub provider: String,

    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    pub method: String,

    /// Absolute URL, or a path relative to the provider's API base URL
    pub url: String,

    /// JSON request body
    #[arg(long, conflicts_with = "form")]
    pub json: Option<String>,

    /// Form field as `key=value`; repeatable
    #[arg(long, value_name = "KEY=VALUE")]
    pub form: Vec<String>,
}
