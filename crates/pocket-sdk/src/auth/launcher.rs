//! Opening the authorization URL for the user

/// Presents an authorization URL to the user
///
/// Launching is best-effort: a failure is logged and the flow keeps
/// waiting for the callback, since the user may open the URL by hand.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launcher that does nothing, for headless use where the URL is shown elsewhere
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLauncher;

impl BrowserLauncher for NoopLauncher {
    fn open(&self, _url: &str) -> std::io::Result<()> {
        Ok(())
    }
}
