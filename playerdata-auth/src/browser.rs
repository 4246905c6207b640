//! Opening the authorization URL for the user.

use std::sync::Arc;

/// Shows the authorization URL to the user.
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`. An error is not fatal; the flow keeps waiting for the callback.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Shared handle to a browser launcher.
pub type BoxedBrowser = Arc<dyn BrowserLauncher>;

impl<F> BrowserLauncher for F
where
    F: Fn(&str) -> std::io::Result<()> + Send + Sync,
{
    fn open(&self, url: &str) -> std::io::Result<()> {
        self(url)
    }
}

/// Opens the system browser and prints the link as a fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        let result = open::that(url);
        eprintln!(
            "If your browser does not open automatically please go to the following link: {url}"
        );
        result
    }
}

/// Only prints the link. For headless machines.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintUrl;

impl BrowserLauncher for PrintUrl {
    fn open(&self, url: &str) -> std::io::Result<()> {
        eprintln!("Open the following link to log in: {url}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_launcher() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let launcher: BoxedBrowser = Arc::new(move |url: &str| -> std::io::Result<()> {
            sink.lock().push(url.to_string());
            Ok(())
        });

        launcher.open("https://example.com/oauth/authorize").unwrap();
        assert_eq!(*seen.lock(), vec!["https://example.com/oauth/authorize".to_string()]);
    }

    #[test]
    fn test_print_url_never_fails() {
        assert!(PrintUrl.open("https://example.com").is_ok());
    }
}
