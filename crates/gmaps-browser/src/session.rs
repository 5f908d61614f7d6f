use std::sync::Arc;

use serde_json::json;

use crate::cdp::CdpClient;
use crate::error::BrowserError;
use crate::page::CdpPage;

/// A page in its own browser context. The context (cookies, storage, the
/// page itself) is disposed by [`PageSession::close`], or in the background
/// if the session is dropped first.
pub struct PageSession {
    page: CdpPage,
    browser: Arc<CdpClient>,
    context_id: String,
    target_id: String,
    closed: bool,
}

impl PageSession {
    pub(crate) fn new(
        page: CdpPage,
        browser: Arc<CdpClient>,
        context_id: String,
        target_id: String,
    ) -> Self {
        Self {
            page,
            browser,
            context_id,
            target_id,
            closed: false,
        }
    }

    #[must_use]
    pub fn page(&self) -> &CdpPage {
        &self.page
    }

    /// Dispose the browser context.
    ///
    /// # Errors
    ///
    /// Returns the CDP error if the browser refuses or is already gone.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.closed = true;
        self.browser
            .send(
                "Target.disposeBrowserContext",
                json!({ "browserContextId": self.context_id }),
            )
            .await?;
        tracing::debug!(
            context_id = %self.context_id,
            target_id = %self.target_id,
            "closed page session"
        );
        Ok(())
    }
}

impl Drop for PageSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                context_id = %self.context_id,
                target_id = %self.target_id,
                "no runtime to dispose browser context"
            );
            return;
        };
        let browser = Arc::clone(&self.browser);
        let context_id = std::mem::take(&mut self.context_id);
        handle.spawn(async move {
            if let Err(e) = browser
                .send(
                    "Target.disposeBrowserContext",
                    json!({ "browserContextId": context_id }),
                )
                .await
            {
                tracing::warn!(context_id = %context_id, error = %e, "failed to dispose browser context");
            }
        });
    }
}
