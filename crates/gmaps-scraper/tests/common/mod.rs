//! Shared fixtures: an in-memory [`PageSurface`] and scratch directories.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use gmaps_scraper::{
    ConsentConfig, DebugRecorder, Element, ElementHandle, LinkConfig, PageError, PageSurface,
    ScrapeConfig, TextMatch,
};

pub const PLACE_LINK_SELECTOR: &str = r#"a[href*="/maps/place/"]"#;
const FEED_HANDLE: &str = "feed";

/// Place URL fixture, distinct per `i`.
pub fn place_url(i: usize) -> String {
    format!("https://www.google.com/maps/place/Place+{i}/data=!4m2!3m1!1s0x{i}")
}

pub fn place_urls(range: std::ops::Range<usize>) -> Vec<String> {
    range.map(place_url).collect()
}

/// Place page HTML carrying a minimal `APP_INITIALIZATION_STATE` blob.
pub fn place_html(name: &str) -> String {
    let blob = json!([
        null,
        null,
        ["Domkloster 4", "50667 Köln"],
        null,
        [null, null, null, null, null, null, null, 4.5, 120],
        null,
        null,
        null,
        null,
        [null, null, 50.94, 6.95],
        format!("id-{name}"),
        name
    ]);
    let state = json!([null, null, null, [null, null, null, null, null, null, blob]]);
    format!("<html><script>;window.APP_INITIALIZATION_STATE={state};window.APP_FLAGS=[];</script></html>")
}

/// Everything the pipeline did to the page, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Navigate(String),
    CurrentUrl,
    QueryRole(String),
    QuerySelector { selector: String, scoped: bool },
    Click(String),
    Wheel { scoped: bool },
    WaitIdle,
    Screenshot,
    Content,
}

#[derive(Debug, Default)]
struct FakeState {
    url: String,
    search_redirect: Option<String>,
    consent_buttons: Vec<(String, Option<String>)>,
    consent_dismissed: bool,
    failing_clicks: Vec<String>,
    /// Anchor batches inside the feed; one more batch becomes visible per
    /// scoped wheel event.
    feed: Option<Vec<Vec<String>>>,
    feed_visible: usize,
    /// Anchor batches outside any feed; revealed by unscoped wheel events.
    document: Vec<Vec<String>>,
    document_visible: usize,
    place_pages: HashMap<String, String>,
    dom: HashMap<String, Vec<Element>>,
    idle_times_out: bool,
    screenshot_fails: bool,
    navigation_fails: bool,
    calls: Vec<Call>,
}

impl FakeState {
    fn visible(batches: &[Vec<String>], count: usize) -> Vec<String> {
        batches.iter().take(count).flatten().cloned().collect()
    }
}

/// Scriptable page. Consent buttons disappear once any of them is clicked.
#[derive(Debug, Default)]
pub struct FakePage {
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new() -> Self {
        let page = Self::default();
        {
            let mut state = page.state.lock().unwrap();
            state.url = "about:blank".to_string();
            state.feed_visible = 1;
            state.document_visible = 1;
        }
        page
    }

    fn edit(mut self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(self.state.get_mut().unwrap());
        self
    }

    pub fn with_consent_button(self, text: &str) -> Self {
        let text = text.to_string();
        self.edit(|s| s.consent_buttons.push((text, None)))
    }

    pub fn with_labelled_consent_button(self, text: &str, aria_label: &str) -> Self {
        let entry = (text.to_string(), Some(aria_label.to_string()));
        self.edit(|s| s.consent_buttons.push(entry))
    }

    pub fn with_failing_click(self, text: &str) -> Self {
        let text = text.to_string();
        self.edit(|s| s.failing_clicks.push(text))
    }

    pub fn with_feed(self, batches: Vec<Vec<String>>) -> Self {
        self.edit(|s| s.feed = Some(batches))
    }

    pub fn with_document_links(self, batches: Vec<Vec<String>>) -> Self {
        self.edit(|s| s.document = batches)
    }

    /// Navigating to a search URL lands on `url` instead.
    pub fn with_search_redirect(self, url: &str) -> Self {
        let url = url.to_string();
        self.edit(|s| s.search_redirect = Some(url))
    }

    pub fn with_place_page(self, url: &str, html: &str) -> Self {
        let (url, html) = (url.to_string(), html.to_string());
        self.edit(|s| {
            s.place_pages.insert(url, html);
        })
    }

    pub fn with_dom(self, selector: &str, elements: Vec<Element>) -> Self {
        let selector = selector.to_string();
        self.edit(|s| {
            s.dom.insert(selector, elements);
        })
    }

    pub fn with_idle_timeout(self) -> Self {
        self.edit(|s| s.idle_times_out = true)
    }

    pub fn with_failing_screenshot(self) -> Self {
        self.edit(|s| s.screenshot_fails = true)
    }

    pub fn with_failing_navigation(self) -> Self {
        self.edit(|s| s.navigation_fails = true)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn wheel_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Wheel { .. }))
    }

    pub fn unscoped_link_scans(&self) -> usize {
        self.count(|c| {
            matches!(c, Call::QuerySelector { selector, scoped: false } if selector == PLACE_LINK_SELECTOR)
        })
    }

    pub fn consent_dismissed(&self) -> bool {
        self.state.lock().unwrap().consent_dismissed
    }

    fn record(&self, call: Call) -> std::sync::MutexGuard<'_, FakeState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

fn anchor_element(href: &str) -> Element {
    Element {
        handle: ElementHandle::new(format!("a:{href}")),
        text: String::new(),
        href: Some(href.to_string()),
        aria_label: None,
    }
}

pub fn element(text: &str) -> Element {
    Element {
        handle: ElementHandle::new(format!("el:{text}")),
        text: text.to_string(),
        href: None,
        aria_label: None,
    }
}

pub fn labelled(aria_label: &str) -> Element {
    Element {
        aria_label: Some(aria_label.to_string()),
        ..element(aria_label)
    }
}

pub fn link_element(href: &str) -> Element {
    anchor_element(href)
}

#[async_trait]
impl PageSurface for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), PageError> {
        let mut state = self.record(Call::Navigate(url.to_string()));
        if state.navigation_fails {
            return Err(PageError::Browser("net::ERR_NAME_NOT_RESOLVED".to_string()));
        }
        let landed = match (&state.search_redirect, url.contains("/maps/search/")) {
            (Some(redirect), true) => redirect.clone(),
            _ => url.to_string(),
        };
        state.url = landed;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.record(Call::CurrentUrl).url.clone())
    }

    async fn query_by_role(&self, role: &str) -> Result<Vec<Element>, PageError> {
        let state = self.record(Call::QueryRole(role.to_string()));
        let found = match role {
            "button" if !state.consent_dismissed => state
                .consent_buttons
                .iter()
                .enumerate()
                .map(|(i, (text, aria_label))| Element {
                    handle: ElementHandle::new(format!("consent:{i}:{text}")),
                    text: text.clone(),
                    href: None,
                    aria_label: aria_label.clone(),
                })
                .collect(),
            "feed" if state.feed.is_some() => vec![Element {
                handle: ElementHandle::new(FEED_HANDLE),
                text: String::new(),
                href: None,
                aria_label: Some("Results".to_string()),
            }],
            _ => Vec::new(),
        };
        Ok(found)
    }

    async fn query_selector_all(
        &self,
        selector: &str,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<Element>, PageError> {
        let state = self.record(Call::QuerySelector {
            selector: selector.to_string(),
            scoped: scope.is_some(),
        });

        if selector != PLACE_LINK_SELECTOR {
            return Ok(state.dom.get(selector).cloned().unwrap_or_default());
        }

        let feed_links = state
            .feed
            .as_deref()
            .map(|batches| FakeState::visible(batches, state.feed_visible))
            .unwrap_or_default();
        let hrefs = match scope {
            Some(handle) if handle.as_str() == FEED_HANDLE => feed_links,
            Some(_) => Vec::new(),
            None => {
                let mut all = feed_links;
                all.extend(FakeState::visible(&state.document, state.document_visible));
                all
            }
        };
        Ok(hrefs.iter().map(|h| anchor_element(h)).collect())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        let mut state = self.record(Call::Click(element.as_str().to_string()));
        let text = element.as_str().splitn(3, ':').nth(2).unwrap_or_default();
        if state.failing_clicks.iter().any(|t| t == text) {
            return Err(PageError::Browser("element is not clickable".to_string()));
        }
        if element.as_str().starts_with("consent:") {
            state.consent_dismissed = true;
        }
        Ok(())
    }

    async fn wheel(&self, scope: Option<&ElementHandle>, _delta_y: f64) -> Result<(), PageError> {
        let mut state = self.record(Call::Wheel {
            scoped: scope.is_some(),
        });
        if scope.is_some() {
            state.feed_visible += 1;
        } else {
            state.document_visible += 1;
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), PageError> {
        let state = self.record(Call::WaitIdle);
        if state.idle_times_out {
            return Err(PageError::Timeout {
                operation: "network idle".to_string(),
                duration: timeout,
            });
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, PageError> {
        let state = self.record(Call::Screenshot);
        if state.screenshot_fails {
            return Err(PageError::Browser("screenshot unavailable".to_string()));
        }
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn content(&self) -> Result<String, PageError> {
        let state = self.record(Call::Content);
        Ok(state
            .place_pages
            .get(&state.url)
            .cloned()
            .unwrap_or_else(|| format!("<html><body>{}</body></html>", state.url)))
    }
}

/// Scrape config with every wait set to zero. Each probe still runs once.
pub fn fast_config() -> ScrapeConfig {
    ScrapeConfig {
        navigation_timeout: Duration::from_secs(5),
        post_navigation_delay: Duration::ZERO,
        detail_delay: Duration::ZERO,
        consent: ConsentConfig {
            timeout: Duration::ZERO,
            poll_interval: Duration::ZERO,
            click_timeout: Duration::from_secs(5),
            network_idle_timeout: Duration::from_secs(5),
            text_match: TextMatch::default(),
        },
        links: LinkConfig {
            feed_wait: Duration::ZERO,
            feed_poll_interval: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            scroll_step_timeout: Duration::from_secs(5),
            scroll_delta_px: 3000,
            max_scroll_steps: 20,
            stale_scroll_limit: 2,
        },
    }
}

/// Uniquely named directory under the OS temp dir, removed on drop.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(name: &str) -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "gmaps-scraper-{name}-{}-{n}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&path);
        std::fs::create_dir_all(&path).expect("create scratch dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn recorder(&self) -> DebugRecorder {
        DebugRecorder::new(&self.path, "maps_debug")
    }

    /// File names in the directory, sorted.
    pub fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.path)
            .expect("read scratch dir")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn files_with(&self, needle: &str) -> Vec<String> {
        self.files()
            .into_iter()
            .filter(|name| name.contains(needle))
            .collect()
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
