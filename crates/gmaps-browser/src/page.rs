//! [`PageSurface`] over a DevTools page target.
//!
//! Elements are addressed by a `data-gmaps-handle` attribute that the query
//! scripts stamp onto every element they return, so a handle stays valid for
//! as long as the element remains in the document.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use gmaps_scraper::{Element, ElementHandle, PageError, PageSurface};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::cdp::{CdpClient, CdpEvent};
use crate::error::BrowserError;
use crate::launch::PageOptions;
use crate::network::{NetworkTracker, QUIET_WINDOW};

const HANDLE_ATTR: &str = "data-gmaps-handle";

/// Upper bound on a single wait for the next event while pumping.
const EVENT_POLL: Duration = Duration::from_millis(100);

const BUTTON_SELECTOR: &str =
    r#"button, [role="button"], input[type="button"], input[type="submit"]"#;

// ---------------------------------------------------------------------------
// Script builders
// ---------------------------------------------------------------------------

/// CSS selector for elements carrying an accessible role, counting native
/// elements with that implicit role.
#[must_use]
pub fn role_selector(role: &str) -> String {
    match role {
        "button" => BUTTON_SELECTOR.to_string(),
        "link" => r#"a[href], [role="link"]"#.to_string(),
        other => format!(r#"[role="{}"]"#, other.replace('"', r#"\""#)),
    }
}

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn handle_selector(handle: &ElementHandle) -> String {
    format!(r#"[{HANDLE_ATTR}="{}"]"#, handle.as_str().replace('"', r#"\""#))
}

/// Script returning `[{handle, text, href, ariaLabel}]` for matches of
/// `selector` under `scope` (or the document), optionally skipping elements
/// without a layout box.
#[must_use]
pub fn query_script(selector: &str, scope: Option<&ElementHandle>, visible_only: bool) -> String {
    let root = match scope {
        Some(handle) => format!("document.querySelector({})", js_string(&handle_selector(handle))),
        None => "document".to_string(),
    };
    format!(
        r"(() => {{
  const root = {root};
  if (!root) return null;
  const attr = {attr};
  return Array.from(root.querySelectorAll({selector}))
    .filter(el => !{visible_only} || el.getClientRects().length > 0)
    .map(el => {{
      let id = el.getAttribute(attr);
      if (!id) {{
        window.__gmapsSeq = (window.__gmapsSeq || 0) + 1;
        id = 'h' + window.__gmapsSeq;
        el.setAttribute(attr, id);
      }}
      return {{
        handle: id,
        text: ({text}).trim(),
        href: typeof el.href === 'string' ? el.href : null,
        ariaLabel: el.getAttribute('aria-label'),
      }};
    }});
}})()",
        attr = js_string(HANDLE_ATTR),
        selector = js_string(selector),
        text = ELEMENT_TEXT_JS,
    )
}

/// Script that scrolls the element into view and returns its box, or `null`
/// if the handle no longer resolves.
#[must_use]
pub fn element_box_script(handle: &ElementHandle) -> String {
    format!(
        r"(() => {{
  const el = document.querySelector({});
  if (!el) return null;
  el.scrollIntoView({{ block: 'center', inline: 'center' }});
  const r = el.getBoundingClientRect();
  return {{ x: r.left, y: r.top, width: r.width, height: r.height }};
}})()",
        js_string(&handle_selector(handle))
    )
}

/// Visible label of `el`. Input buttons carry theirs in `value`, not in
/// their (empty) text content.
const ELEMENT_TEXT_JS: &str =
    "el instanceof HTMLInputElement ? (el.value || '') : (el.innerText || el.textContent || '')";

const VIEWPORT_BOX_SCRIPT: &str =
    "({ x: 0, y: 0, width: window.innerWidth, height: window.innerHeight })";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawElement {
    handle: String,
    #[serde(default)]
    text: String,
    href: Option<String>,
    aria_label: Option<String>,
}

/// Decode the value returned by [`query_script`]. A `null` (scope element
/// gone) decodes to no elements.
///
/// # Errors
///
/// [`BrowserError::Protocol`] if the value has an unexpected shape.
pub fn parse_elements(value: Value) -> Result<Vec<Element>, BrowserError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawElement> = serde_json::from_value(value).map_err(|e| BrowserError::Protocol {
        detail: format!("unexpected element query result: {e}"),
    })?;
    Ok(raw
        .into_iter()
        .map(|r| Element {
            handle: ElementHandle::new(r.handle),
            text: r.text,
            href: r.href.filter(|h| !h.is_empty()),
            aria_label: r.aria_label,
        })
        .collect())
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct BoxRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoxRect {
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

fn mouse_event(kind: &str, (x, y): (f64, f64)) -> Value {
    let button = if kind == "mouseMoved" { "none" } else { "left" };
    json!({ "type": kind, "x": x, "y": y, "button": button, "clickCount": 1 })
}

fn wheel_event((x, y): (f64, f64), delta_y: f64) -> Value {
    json!({ "type": "mouseWheel", "x": x, "y": y, "deltaX": 0, "deltaY": delta_y })
}

// ---------------------------------------------------------------------------
// CdpPage
// ---------------------------------------------------------------------------

/// One page target driven over its own DevTools connection.
pub struct CdpPage {
    client: CdpClient,
    network: Mutex<NetworkTracker>,
}

impl CdpPage {
    /// Connect to a page target and apply user agent, locale and viewport.
    ///
    /// # Errors
    ///
    /// Fails if the connection or any mandatory setup command fails.
    pub async fn attach(
        ws_url: &str,
        options: &PageOptions,
        command_timeout: Duration,
    ) -> Result<Self, BrowserError> {
        let client = CdpClient::connect(ws_url, command_timeout).await?;
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;
        client.enable_domain("Network").await?;

        let mut ua = json!({ "userAgent": options.user_agent });
        if let Some(lang) = &options.lang {
            ua["acceptLanguage"] = Value::String(lang.clone());
        }
        client.send("Emulation.setUserAgentOverride", ua).await?;

        if let Some(lang) = &options.lang {
            if let Err(e) = client
                .send("Emulation.setLocaleOverride", json!({ "locale": lang }))
                .await
            {
                tracing::warn!(lang = %lang, error = %e, "locale override rejected");
            }
        }

        client
            .send(
                "Emulation.setDeviceMetricsOverride",
                json!({
                    "width": options.viewport.0,
                    "height": options.viewport.1,
                    "deviceScaleFactor": 1,
                    "mobile": false,
                }),
            )
            .await?;

        Ok(Self {
            client,
            network: Mutex::new(NetworkTracker::new(Instant::now())),
        })
    }

    fn observe(&self, events: &[CdpEvent]) {
        let now = Instant::now();
        if let Ok(mut tracker) = self.network.lock() {
            for event in events {
                tracker.observe(&event.method, &event.params, now);
            }
        }
    }

    fn reset_network(&self) {
        if let Ok(mut tracker) = self.network.lock() {
            tracker.reset(Instant::now());
        }
    }

    /// Wait for the next event and feed it to the network tracker.
    async fn pump(&self, wait: Duration) -> Result<Option<CdpEvent>, BrowserError> {
        let event = self.client.next_event(wait).await?;
        if let Some(event) = &event {
            self.observe(std::slice::from_ref(event));
        }
        Ok(event)
    }

    /// `Runtime.evaluate` with by-value return.
    ///
    /// # Errors
    ///
    /// [`BrowserError::JsException`] if the script throws.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .client
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .pointer("/exception/description")
                .or_else(|| exception.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("unknown exception")
                .to_string();
            return Err(BrowserError::JsException { message });
        }

        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    async fn evaluate_string(&self, expression: &str) -> Result<String, BrowserError> {
        self.evaluate(expression)
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::Protocol {
                detail: format!("{expression} did not return a string"),
            })
    }

    async fn element_box(&self, handle: &ElementHandle) -> Result<BoxRect, BrowserError> {
        let value = self.evaluate(&element_box_script(handle)).await?;
        if value.is_null() {
            return Err(BrowserError::ElementNotFound {
                handle: handle.as_str().to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| BrowserError::Protocol {
            detail: format!("unexpected element box: {e}"),
        })
    }

    async fn query(
        &self,
        selector: &str,
        scope: Option<&ElementHandle>,
        visible_only: bool,
    ) -> Result<Vec<Element>, BrowserError> {
        let value = self
            .evaluate(&query_script(selector, scope, visible_only))
            .await?;
        parse_elements(value)
    }

    async fn navigate_inner(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        let stale = self.client.drain_events().await;
        self.observe(&stale);
        self.reset_network();

        let result = self
            .client
            .send_with_timeout("Page.navigate", json!({ "url": url }), timeout)
            .await?;
        if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
            return Err(BrowserError::NavigationFailed {
                url: url.to_string(),
                reason: reason.to_string(),
            });
        }
        // Same-document navigations have no loader and fire no load events.
        if result.get("loaderId").is_none() {
            return Ok(());
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BrowserError::Timeout {
                    method: "Page.domContentEventFired".to_string(),
                    duration: timeout,
                });
            }
            if let Some(event) = self.pump(remaining.min(EVENT_POLL)).await? {
                if event.method == "Page.domContentEventFired" {
                    return Ok(());
                }
            }
        }
    }

    async fn network_idle_inner(&self, timeout: Duration) -> Result<(), BrowserError> {
        let deadline = Instant::now() + timeout;
        loop {
            let pending = self.client.drain_events().await;
            self.observe(&pending);

            let now = Instant::now();
            let quiet_left = self
                .network
                .lock()
                .ok()
                .and_then(|t| t.quiet_remaining(now, QUIET_WINDOW));
            if quiet_left == Some(Duration::ZERO) {
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                return Err(BrowserError::Timeout {
                    method: "network idle".to_string(),
                    duration: timeout,
                });
            }
            let wait = quiet_left.unwrap_or(EVENT_POLL).min(EVENT_POLL).min(remaining);
            self.pump(wait.max(Duration::from_millis(1))).await?;
        }
    }

    async fn screenshot_inner(&self) -> Result<Vec<u8>, BrowserError> {
        let metrics = self
            .client
            .send("Page.getLayoutMetrics", json!({}))
            .await?;
        let size = metrics
            .get("cssContentSize")
            .or_else(|| metrics.get("contentSize"));
        let width = size
            .and_then(|s| s.get("width"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let height = size
            .and_then(|s| s.get("height"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        let mut params = json!({ "format": "png", "captureBeyondViewport": true });
        if width > 0.0 && height > 0.0 {
            params["clip"] = json!({ "x": 0, "y": 0, "width": width, "height": height, "scale": 1 });
        }

        let result = self.client.send("Page.captureScreenshot", params).await?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol {
                detail: "Page.captureScreenshot returned no data".to_string(),
            })?;
        B64.decode(data).map_err(|e| BrowserError::Protocol {
            detail: format!("failed to decode screenshot: {e}"),
        })
    }

    async fn click_inner(&self, handle: &ElementHandle) -> Result<(), BrowserError> {
        let rect = self.element_box(handle).await?;
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return Err(BrowserError::ElementNotInteractable {
                reason: format!("{} has size {}x{}", handle.as_str(), rect.width, rect.height),
            });
        }
        let center = rect.center();
        for kind in ["mouseMoved", "mousePressed", "mouseReleased"] {
            self.client
                .send("Input.dispatchMouseEvent", mouse_event(kind, center))
                .await?;
        }
        Ok(())
    }

    async fn wheel_inner(&self, scope: Option<&ElementHandle>, delta_y: f64) -> Result<(), BrowserError> {
        let rect = match scope {
            Some(handle) => self.element_box(handle).await?,
            None => serde_json::from_value(self.evaluate(VIEWPORT_BOX_SCRIPT).await?).map_err(
                |e| BrowserError::Protocol {
                    detail: format!("unexpected viewport box: {e}"),
                },
            )?,
        };
        self.client
            .send("Input.dispatchMouseEvent", wheel_event(rect.center(), delta_y))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PageSurface for CdpPage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), PageError> {
        Ok(self.navigate_inner(url, timeout).await?)
    }

    async fn current_url(&self) -> Result<String, PageError> {
        Ok(self.evaluate_string("window.location.href").await?)
    }

    async fn query_by_role(&self, role: &str) -> Result<Vec<Element>, PageError> {
        Ok(self.query(&role_selector(role), None, true).await?)
    }

    async fn query_selector_all(
        &self,
        selector: &str,
        scope: Option<&ElementHandle>,
    ) -> Result<Vec<Element>, PageError> {
        Ok(self.query(selector, scope, false).await?)
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        Ok(self.click_inner(element).await?)
    }

    async fn wheel(&self, scope: Option<&ElementHandle>, delta_y: f64) -> Result<(), PageError> {
        Ok(self.wheel_inner(scope, delta_y).await?)
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), PageError> {
        Ok(self.network_idle_inner(timeout).await?)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, PageError> {
        Ok(self.screenshot_inner().await?)
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self
            .evaluate_string("document.documentElement.outerHTML")
            .await?)
    }
}
