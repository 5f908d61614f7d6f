use std::time::Duration;

use gmaps_scraper::PageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to connect to Chrome DevTools at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("CDP error {code}: {message}")]
    CdpError {
        code: i64,
        message: String,
        data: Option<String>,
    },

    #[error("CDP command '{method}' timed out after {duration:?}")]
    Timeout { method: String, duration: Duration },

    #[error("CDP protocol error: {detail}")]
    Protocol { detail: String },

    #[error("element {handle} is no longer attached to the page")]
    ElementNotFound { handle: String },

    #[error("element not interactable: {reason}")]
    ElementNotInteractable { reason: String },

    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("JavaScript exception: {message}")]
    JsException { message: String },

    #[error("failed to launch browser {path}: {source}")]
    Launch {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("DevTools discovery at {endpoint} failed: {source}")]
    Discovery {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("browser exited during startup: {status}")]
    BrowserExited { status: String },

    #[error("browser at {endpoint} did not become ready within {duration:?}")]
    StartupTimeout { endpoint: String, duration: Duration },
}

impl From<BrowserError> for PageError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Timeout { method, duration } => PageError::Timeout {
                operation: method,
                duration,
            },
            BrowserError::ConnectionFailed { .. } => PageError::Closed,
            other => PageError::Browser(other.to_string()),
        }
    }
}
