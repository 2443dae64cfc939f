//! Browser launcher for the interactive login

use crate::output::{print_info, print_link};
use pocket_sdk::BrowserLauncher;
use tracing::debug;

/// Prints the authorization URL to stderr and tries the system browser
///
/// The URL stays visible so the login can be finished from another
/// machine when no browser is available.
#[derive(Debug, Default)]
pub struct TerminalLauncher;

impl BrowserLauncher for TerminalLauncher {
    fn open(&self, url: &str) -> std::io::Result<()> {
        print_info("Opening your browser to authorize pocket");
        print_link("If it does not open, visit", url);
        webbrowser::open(url)?;
        debug!("Browser launched");
        Ok(())
    }
}
