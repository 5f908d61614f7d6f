//! One scrape, end to end: search page, consent, link collection, details.

use std::fmt;

use gmaps_core::{AppConfig, PlaceDetails, ScrapeRequest};

use crate::config::ScrapeConfig;
use crate::consent::ConsentResolver;
use crate::debug::{DebugReason, DebugRecorder};
use crate::error::ScrapeError;
use crate::extract::{extract_place_data, extract_place_data_dom};
use crate::links::{LinkCollector, PlaceLink};
use crate::page::{bounded, PageSurface};
use crate::search::search_url;

/// Pipeline position, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStage {
    Start,
    Consent,
    CollectLinks,
    ExtractDetails,
    Done,
}

impl ScrapeStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Consent => "consent",
            Self::CollectLinks => "collect_links",
            Self::ExtractDetails => "extract_details",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ScrapeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Scraper {
    config: ScrapeConfig,
    recorder: DebugRecorder,
}

impl Scraper {
    #[must_use]
    pub fn new(config: ScrapeConfig, recorder: DebugRecorder) -> Self {
        Self { config, recorder }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            ScrapeConfig::from_app_config(config),
            DebugRecorder::from_app_config(config),
        )
    }

    /// Run one scrape on `page`.
    ///
    /// The pipeline never retries. Finding nothing is not an error: the
    /// result is then an empty `Vec`, and a `zero_results` debug capture is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::InvalidRequest`] before touching the page if the
    /// request is invalid, and [`ScrapeError::Navigation`] if the search page
    /// cannot be opened.
    pub async fn scrape(
        &self,
        page: &dyn PageSurface,
        request: &ScrapeRequest,
    ) -> Result<Vec<PlaceDetails>, ScrapeError> {
        request.validate()?;
        let query = request.query.trim();
        let lang = request.lang_tag();

        let url = search_url(query, lang);
        log_stage(query, ScrapeStage::Start);
        tracing::info!(query, url = %url, max_places = ?request.max_places, "starting scrape");

        let timeout = self.config.navigation_timeout;
        bounded("navigate", timeout, page.navigate(&url, timeout))
            .await
            .map_err(|source| ScrapeError::Navigation {
                url: url.clone(),
                source,
            })?;
        tokio::time::sleep(self.config.post_navigation_delay).await;

        log_stage(query, ScrapeStage::Consent);
        let consent = ConsentResolver::new(self.config.consent.clone())
            .resolve(page, lang)
            .await;
        tracing::debug!(query, ?consent, "consent step finished");

        log_stage(query, ScrapeStage::CollectLinks);
        let collector = LinkCollector::new(self.config.links.clone(), self.recorder.clone());
        let collected = collector.collect(page, request.max_places).await;
        if collected.is_empty() {
            tracing::error!(query, "no place links found by any strategy");
            self.recorder.capture(page, DebugReason::ZeroResults).await;
            log_stage(query, ScrapeStage::Done);
            return Ok(Vec::new());
        }

        log_stage(query, ScrapeStage::ExtractDetails);
        let total = collected.links.len();
        let mut places = Vec::with_capacity(total);
        for (index, link) in collected.links.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.detail_delay).await;
            }
            match self.place_details(page, link).await {
                Some(details) => places.push(details),
                None => tracing::warn!(query, link = %link, "skipping place without extractable details"),
            }
        }

        tracing::info!(
            query,
            tier = ?collected.tier,
            links = total,
            places = places.len(),
            "scrape finished"
        );
        log_stage(query, ScrapeStage::Done);
        Ok(places)
    }

    async fn place_details(&self, page: &dyn PageSurface, link: &PlaceLink) -> Option<PlaceDetails> {
        let timeout = self.config.navigation_timeout;
        if let Err(e) = bounded("navigate", timeout, page.navigate(link.as_str(), timeout)).await {
            tracing::warn!(link = %link, error = %e, "failed to open place page");
            return None;
        }

        match bounded("page content", timeout, page.content()).await {
            Ok(html) => {
                if let Some(details) = extract_place_data(&html, link.as_str()) {
                    return Some(details);
                }
                tracing::debug!(link = %link, "falling back to dom extraction");
            }
            Err(e) => tracing::warn!(link = %link, error = %e, "failed to read place page html"),
        }

        extract_place_data_dom(page, link.as_str(), self.config.links.scroll_step_timeout).await
    }
}

fn log_stage(query: &str, stage: ScrapeStage) {
    tracing::debug!(query, %stage, "scrape stage");
}
