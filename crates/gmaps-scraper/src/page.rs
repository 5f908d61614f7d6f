//! The browser capability surface the scraper depends on.
//!
//! Everything the pipeline does to a page goes through [`PageSurface`], so a
//! Chrome DevTools adapter and an in-memory fake are interchangeable.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PageError;

/// Opaque reference to an element found by a previous query.
///
/// Only meaningful to the [`PageSurface`] that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A snapshot of one element at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub handle: ElementHandle,
    /// Rendered text, trimmed.
    pub text: String,
    /// Resolved absolute `href`, for anchors.
    pub href: Option<String>,
    pub aria_label: Option<String>,
}

#[async_trait]
pub trait PageSurface: Send + Sync {
    /// Navigate and wait until the DOM content has loaded.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError>;

    async fn current_url(&self) -> Result<String, PageError>;

    /// Elements whose accessible role is `role`, in document order.
    ///
    /// Native elements count for their implicit role (a `<button>` has role
    /// `button`).
    async fn query_by_role(&self, role: &str) -> Result<Vec<Element>, PageError>;

    /// Elements matching a CSS selector, in document order. With `scope` the
    /// search is limited to that element's subtree.
    async fn query_selector_all(
        &self,
        selector: &str,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<Element>, PageError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError>;

    /// Simulate a mouse-wheel scroll of `delta_y` pixels over `scope`, or over
    /// the document body when `scope` is `None`.
    async fn wheel(&self, scope: Option<&ElementHandle>, delta_y: f64) -> Result<(), PageError>;

    /// Wait until no network requests have been in flight for a short quiet
    /// window.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), PageError>;

    /// Full-page PNG screenshot.
    async fn screenshot(&self) -> Result<Vec<u8>, PageError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, PageError>;
}

/// Run `future` with an upper bound, mapping expiry to [`PageError::Timeout`].
pub(crate) async fn bounded<T, F>(operation: &str, limit: Duration, future: F) -> Result<T, PageError>
where
    F: Future<Output = Result<T, PageError>>,
{
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or_else(|_| {
            Err(PageError::Timeout {
                operation: operation.to_string(),
                duration: limit,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_passes_through_ready_results() {
        let result = bounded("noop", Duration::ZERO, async { Ok::<_, PageError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn bounded_maps_expiry_to_timeout() {
        let result: Result<(), PageError> = bounded(
            "wheel",
            Duration::from_millis(5),
            std::future::pending(),
        )
        .await;
        assert!(
            matches!(result, Err(PageError::Timeout { ref operation, .. }) if operation == "wheel"),
            "expected Timeout, got: {result:?}"
        );
    }
}
