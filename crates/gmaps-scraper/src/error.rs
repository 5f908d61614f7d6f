use std::time::Duration;

use gmaps_core::RequestError;
use thiserror::Error;

/// Failures reported by a [`crate::PageSurface`] implementation.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("page is closed")]
    Closed,
}

/// Failures that prevent a scrape from producing any result sequence.
///
/// Empty results are not errors: a scrape that finds nothing returns
/// `Ok(vec![])`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid scrape request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("failed to open search page {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: PageError,
    },
}
