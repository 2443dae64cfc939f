use crate::cli::{commands::Commands, handlers};
use crate::config::CliConfig;
use crate::error::Result;
use crate::output::Output;
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::PathBuf;

/// pocket - third-party APIs from the command line
#[derive(Parser, Debug)]
#[command(
    name = "pocket",
    version,
    about = "pocket - third-party APIs from the command line",
    long_about = "Call third-party APIs with stored credentials. Tokens are fetched, \
cached and refreshed automatically; every result is printed as JSON.

QUICK START:
  pocket config set spotify_client_id <id>
  pocket config set spotify_client_secret <secret>
  pocket api spotify GET '/search?q=daft%20punk&type=artist'

INTERACTIVE LOGIN:
  pocket auth login x               # Browser login (PKCE)
  pocket auth status                # Token state for every provider

PROVIDERS:
  pocket providers                  # Built-in providers and required keys"
)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true, env = "POCKET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Indent JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Args {
    pub fn output(&self) -> Output {
        Output::new(self.pretty)
    }

    /// Execute the CLI command and print its result
    pub async fn run(self) -> Result<()> {
        let output = self.output();
        let config = CliConfig::load(self.config.as_deref())?;

        let result = match self.command {
            Commands::Auth { action } => handlers::auth::handle_auth(action, &config).await?,
            Commands::Config { action } => {
                handlers::config::handle_config(action, &config).await?
            }
            Commands::Api(args) => handlers::api::handle_api(args, &config).await?,
            Commands::Providers => handlers::providers::handle_providers(&config)?,
        };

        output.print(&result)
    }
}
