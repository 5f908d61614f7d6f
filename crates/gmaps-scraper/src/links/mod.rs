//! Place-link collection from a search results page.
//!
//! Three strategies are tried in [`Tier::ORDER`]; the first one that yields
//! any link wins and the rest never run.

mod scroll;
mod set;

use std::fmt;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::LinkConfig;
use crate::debug::{DebugReason, DebugRecorder};
use crate::page::{bounded, Element, PageSurface};

/// Path segment that identifies a place detail page.
pub const PLACE_PATH: &str = "/maps/place/";

pub(crate) const PLACE_LINK_SELECTOR: &str = r#"a[href*="/maps/place/"]"#;

/// URL of one place detail page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PlaceLink(String);

impl PlaceLink {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PlaceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Scroll the results feed and collect the anchors inside it.
    Feed,
    /// The search redirected straight to one place page.
    SinglePlace,
    /// Scroll the whole document and collect every place anchor.
    GlobalFallback,
}

impl Tier {
    pub const ORDER: [Tier; 3] = [Tier::Feed, Tier::SinglePlace, Tier::GlobalFallback];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::SinglePlace => "single_place",
            Self::GlobalFallback => "global_fallback",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`LinkCollector::collect`]. `tier` is `None` exactly when
/// `links` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedLinks {
    pub links: Vec<PlaceLink>,
    pub tier: Option<Tier>,
}

impl CollectedLinks {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LinkCollector {
    config: LinkConfig,
    recorder: DebugRecorder,
}

impl LinkCollector {
    #[must_use]
    pub fn new(config: LinkConfig, recorder: DebugRecorder) -> Self {
        Self { config, recorder }
    }

    /// Run the tiers in order and return the first non-empty result, capped
    /// at `cap` links.
    pub async fn collect(&self, page: &dyn PageSurface, cap: Option<usize>) -> CollectedLinks {
        for tier in Tier::ORDER {
            let links = self.run_tier(tier, page, cap).await;
            if !links.is_empty() {
                tracing::info!(%tier, count = links.len(), "collected place links");
                return CollectedLinks {
                    links,
                    tier: Some(tier),
                };
            }
            tracing::debug!(%tier, "tier yielded no links");
        }
        CollectedLinks::default()
    }

    /// Run a single tier. Exposed so callers can drive one strategy directly.
    pub async fn run_tier(
        &self,
        tier: Tier,
        page: &dyn PageSurface,
        cap: Option<usize>,
    ) -> Vec<PlaceLink> {
        match tier {
            Tier::Feed => self.feed(page, cap).await,
            Tier::SinglePlace => self.single_place(page, cap).await,
            Tier::GlobalFallback => scroll::scroll_collect(page, None, cap, &self.config).await,
        }
    }

    async fn feed(&self, page: &dyn PageSurface, cap: Option<usize>) -> Vec<PlaceLink> {
        let Some(feed) = self.wait_for_feed(page).await else {
            tracing::info!(waited = ?self.config.feed_wait, "results feed not found");
            self.recorder.capture(page, DebugReason::FeedNotFound).await;
            return Vec::new();
        };
        scroll::scroll_collect(page, Some(&feed.handle), cap, &self.config).await
    }

    async fn wait_for_feed(&self, page: &dyn PageSurface) -> Option<Element> {
        let poll = self.config.feed_poll_interval;
        let deadline = Instant::now() + self.config.feed_wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match bounded("feed probe", remaining.max(poll), page.query_by_role("feed")).await {
                Ok(feeds) => {
                    if let Some(feed) = feeds.into_iter().next() {
                        return Some(feed);
                    }
                }
                Err(e) => tracing::debug!(error = %e, "feed probe failed"),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            tokio::time::sleep(remaining.min(poll)).await;
        }
    }

    async fn single_place(&self, page: &dyn PageSurface, cap: Option<usize>) -> Vec<PlaceLink> {
        let url = match bounded("current url", self.config.scroll_step_timeout, page.current_url()).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "could not read page url");
                return Vec::new();
            }
        };

        if !url.contains(PLACE_PATH) {
            return Vec::new();
        }

        let mut set = set::LinkSet::new(cap);
        set.insert(&url);
        set.into_links()
    }
}
