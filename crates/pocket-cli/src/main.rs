//! Main entry point for the pocket CLI

use clap::Parser;
use pocket_cli::cli::Args;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Disable location display (file paths and line numbers)
    if let Err(e) = color_eyre::config::HookBuilder::default()
        .display_location_section(false)
        .display_env_section(false)
        .install()
    {
        eprintln!("Failed to install error hooks: {e}");
    }

    // Silent unless -v or RUST_LOG asks for logs; stdout stays JSON-only.
    if let Err(e) = pocket_common::logging::init_cli_logging(
        &args.verbosity,
        "pocket=warn,pocket_cli=warn,pocket_sdk=warn",
    ) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let output = args.output();
    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output.print_error(&err);
            ExitCode::FAILURE
        }
    }
}
