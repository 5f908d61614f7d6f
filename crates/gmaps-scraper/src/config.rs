//! Tunables for one scrape, derived from [`gmaps_core::AppConfig`].

use std::borrow::Cow;
use std::time::Duration;

use gmaps_core::AppConfig;

/// How consent button labels are compared against button text.
///
/// Matching is always a substring test: the phrase must occur somewhere in the
/// button text. The two flags control normalization applied to both sides
/// before the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextMatch {
    pub case_sensitive: bool,
    /// Collapse whitespace runs (including non-breaking spaces) to a single
    /// space and trim the ends.
    pub collapse_whitespace: bool,
}

impl Default for TextMatch {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            collapse_whitespace: true,
        }
    }
}

impl TextMatch {
    /// Returns `true` when `phrase` occurs in `text` under this policy.
    /// An empty phrase never matches.
    #[must_use]
    pub fn matches(&self, text: &str, phrase: &str) -> bool {
        let phrase = self.normalize(phrase);
        if phrase.is_empty() {
            return false;
        }
        self.normalize(text).contains(phrase.as_ref())
    }

    fn normalize<'a>(&self, s: &'a str) -> Cow<'a, str> {
        let mut out: Cow<'a, str> = Cow::Borrowed(s);
        if self.collapse_whitespace {
            out = Cow::Owned(out.split_whitespace().collect::<Vec<_>>().join(" "));
        }
        if !self.case_sensitive {
            out = Cow::Owned(out.to_lowercase());
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ConsentConfig {
    /// Total time spent probing for a consent dialog.
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub click_timeout: Duration,
    pub network_idle_timeout: Duration,
    pub text_match: TextMatch,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            poll_interval: Duration::from_millis(250),
            click_timeout: Duration::from_millis(5000),
            network_idle_timeout: Duration::from_millis(8000),
            text_match: TextMatch::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long to keep probing for the results feed before falling back.
    pub feed_wait: Duration,
    pub feed_poll_interval: Duration,
    /// Settle time after every wheel-scroll step.
    pub scroll_pause: Duration,
    pub scroll_step_timeout: Duration,
    pub scroll_delta_px: u32,
    pub max_scroll_steps: u32,
    /// Consecutive scroll steps without a new link before giving up.
    pub stale_scroll_limit: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            feed_wait: Duration::from_millis(25_000),
            feed_poll_interval: Duration::from_millis(500),
            scroll_pause: Duration::from_millis(1500),
            scroll_step_timeout: Duration::from_millis(5000),
            scroll_delta_px: 3000,
            max_scroll_steps: 20,
            stale_scroll_limit: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub navigation_timeout: Duration,
    /// Pause after the search page loads, before looking for consent.
    pub post_navigation_delay: Duration,
    /// Pause between place detail page visits.
    pub detail_delay: Duration,
    pub consent: ConsentConfig,
    pub links: LinkConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            post_navigation_delay: Duration::from_millis(2000),
            detail_delay: Duration::from_millis(500),
            consent: ConsentConfig::default(),
            links: LinkConfig::default(),
        }
    }
}

impl ScrapeConfig {
    /// Input actions (consent click, wheel step) share `click_timeout_ms`.
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let click_timeout = Duration::from_millis(config.click_timeout_ms);
        Self {
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            post_navigation_delay: Duration::from_millis(config.post_navigation_delay_ms),
            detail_delay: Duration::from_millis(config.detail_delay_ms),
            consent: ConsentConfig {
                timeout: Duration::from_millis(config.consent_timeout_ms),
                click_timeout,
                network_idle_timeout: Duration::from_millis(config.network_idle_timeout_ms),
                text_match: TextMatch {
                    case_sensitive: config.consent_case_sensitive,
                    collapse_whitespace: config.consent_collapse_whitespace,
                },
                ..ConsentConfig::default()
            },
            links: LinkConfig {
                feed_wait: Duration::from_millis(config.feed_wait_ms),
                scroll_pause: Duration::from_millis(config.scroll_pause_ms),
                scroll_step_timeout: click_timeout,
                scroll_delta_px: config.scroll_delta_px,
                max_scroll_steps: config.max_scroll_steps,
                stale_scroll_limit: config.stale_scroll_limit.max(1),
                ..LinkConfig::default()
            },
        }
    }
}
