//! Opening the consent URL

use std::io;

/// Presents the authorization URL to the user.
///
/// The credential manager calls this once per interactive flow, after the
/// callback listener is already accepting connections.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Opens the URL in the platform's default browser.
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        open::that(url)
    }
}

/// Prints the URL on stderr for headless machines.
pub struct PrintUrl;

impl BrowserLauncher for PrintUrl {
    fn open(&self, url: &str) -> io::Result<()> {
        eprintln!("Open this URL in a browser to authorize access:\n\n  {url}\n");
        Ok(())
    }
}
