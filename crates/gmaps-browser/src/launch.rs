//! Starting, attaching to, and shutting down Chrome.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gmaps_core::AppConfig;
use serde_json::{json, Value};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::cdp::CdpClient;
use crate::error::BrowserError;
use crate::page::CdpPage;
use crate::session::PageSession;

const DISCOVERY_POLL: Duration = Duration::from_millis(250);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Written by Chrome into its profile once the DevTools server is listening:
/// the port on the first line, the browser target path on the second.
const ACTIVE_PORT_FILE: &str = "DevToolsActivePort";

static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// How to obtain a browser.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Attach here instead of launching. Either an `http://host:port`
    /// DevTools endpoint or a `ws://` browser URL.
    pub endpoint: Option<String>,
    pub chrome_path: String,
    /// `0` lets Chrome choose a free port.
    pub debug_port: u16,
    pub headless: bool,
    pub startup_timeout: Duration,
    /// Default per-command CDP timeout.
    pub command_timeout: Duration,
}

impl BrowserOptions {
    #[must_use]
    pub fn from_app_config(cfg: &AppConfig, headless: bool) -> Self {
        Self {
            endpoint: cfg.cdp_endpoint.clone(),
            chrome_path: cfg.chrome_path.clone(),
            debug_port: cfg.chrome_debug_port,
            headless,
            startup_timeout: Duration::from_secs(cfg.browser_startup_timeout_secs),
            command_timeout: Duration::from_secs(cfg.navigation_timeout_secs),
        }
    }
}

/// Per-page emulation settings.
#[derive(Debug, Clone)]
pub struct PageOptions {
    pub user_agent: String,
    /// BCP-47 tag applied as `Accept-Language` and locale.
    pub lang: Option<String>,
    pub viewport: (u32, u32),
}

impl PageOptions {
    #[must_use]
    pub fn from_app_config(cfg: &AppConfig, lang: Option<&str>) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            lang: lang
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            viewport: (1366, 900),
        }
    }
}

/// Command-line flags for a launched Chrome.
#[must_use]
pub fn chrome_args(options: &BrowserOptions, user_data_dir: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", options.debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
    ];
    if options.headless {
        args.push("--headless=new".to_string());
    }
    args.push("about:blank".to_string());
    args
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Read the browser WebSocket URL from `{endpoint}/json/version`.
///
/// # Errors
///
/// [`BrowserError::Discovery`] on HTTP failure or non-2xx status,
/// [`BrowserError::Protocol`] if the response lacks `webSocketDebuggerUrl`.
pub async fn discover_ws_url(http: &reqwest::Client, endpoint: &str) -> Result<String, BrowserError> {
    let url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    let discovery = |source| BrowserError::Discovery {
        endpoint: endpoint.to_string(),
        source,
    };

    let body: Value = http
        .get(&url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(discovery)?
        .json()
        .await
        .map_err(discovery)?;

    body.get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol {
            detail: format!("{url} has no webSocketDebuggerUrl"),
        })
}

/// Poll [`discover_ws_url`] until it succeeds or `timeout` passes.
///
/// # Errors
///
/// [`BrowserError::StartupTimeout`] if the endpoint never answers.
pub async fn wait_for_ws_url(
    http: &reqwest::Client,
    endpoint: &str,
    timeout: Duration,
) -> Result<String, BrowserError> {
    let deadline = Instant::now() + timeout;
    loop {
        match discover_ws_url(http, endpoint).await {
            Ok(url) => return Ok(url),
            Err(e) => tracing::debug!(endpoint, error = %e, "DevTools endpoint not ready"),
        }
        if Instant::now() + DISCOVERY_POLL > deadline {
            return Err(BrowserError::StartupTimeout {
                endpoint: endpoint.to_string(),
                duration: timeout,
            });
        }
        tokio::time::sleep(DISCOVERY_POLL).await;
    }
}

/// Browser WebSocket URL named by the contents of a `DevToolsActivePort`
/// file. `None` until both lines have been written.
#[must_use]
pub fn active_port_ws_url(contents: &str) -> Option<String> {
    let mut lines = contents.lines();
    let port: u16 = lines.next()?.trim().parse().ok()?;
    let path = lines.next()?.trim();
    if port == 0 || !path.starts_with("/devtools/browser/") {
        return None;
    }
    Some(format!("ws://127.0.0.1:{port}{path}"))
}

/// Read the WebSocket URL a browser launched with `user_data_dir` published
/// into that profile.
pub async fn read_active_port(user_data_dir: &Path) -> Option<String> {
    let contents = tokio::fs::read_to_string(user_data_dir.join(ACTIVE_PORT_FILE))
        .await
        .ok()?;
    active_port_ws_url(&contents)
}

/// Wait until our own child has published its DevTools port. Only the
/// child's private profile is consulted, so a different browser listening on
/// the same port is never picked up.
///
/// # Errors
///
/// [`BrowserError::BrowserExited`] if the child dies first,
/// [`BrowserError::StartupTimeout`] if the port file never appears.
pub async fn wait_for_active_port(
    child: &mut Child,
    user_data_dir: &Path,
    timeout: Duration,
) -> Result<String, BrowserError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(ws_url) = read_active_port(user_data_dir).await {
            return Ok(ws_url);
        }
        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(BrowserError::BrowserExited {
                    status: status.to_string(),
                })
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "could not poll browser process"),
        }
        if Instant::now() + DISCOVERY_POLL > deadline {
            return Err(BrowserError::StartupTimeout {
                endpoint: user_data_dir.join(ACTIVE_PORT_FILE).display().to_string(),
                duration: timeout,
            });
        }
        tokio::time::sleep(DISCOVERY_POLL).await;
    }
}

/// Page target URL on the same DevTools server as `browser_ws`.
///
/// # Errors
///
/// [`BrowserError::Protocol`] if `browser_ws` has no `/devtools/` path.
pub fn page_ws_url(browser_ws: &str, target_id: &str) -> Result<String, BrowserError> {
    let base = browser_ws
        .find("/devtools/")
        .map(|i| &browser_ws[..i])
        .ok_or_else(|| BrowserError::Protocol {
            detail: format!("unexpected browser websocket url: {browser_ws}"),
        })?;
    Ok(format!("{base}/devtools/page/{target_id}"))
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, BrowserError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(2))
        .build()
        .map_err(|source| BrowserError::Discovery {
            endpoint: "http client".to_string(),
            source,
        })
}

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// A connected browser, launched by us or already running.
pub struct Browser {
    client: Arc<CdpClient>,
    ws_url: String,
    command_timeout: Duration,
    child: Option<Child>,
    user_data_dir: Option<PathBuf>,
}

impl Browser {
    /// Attach to `options.endpoint` when set, otherwise launch Chrome.
    ///
    /// # Errors
    ///
    /// Fails if Chrome cannot be spawned, never exposes its DevTools
    /// endpoint, or refuses the WebSocket connection.
    pub async fn start(options: &BrowserOptions) -> Result<Self, BrowserError> {
        match &options.endpoint {
            Some(endpoint) => Self::connect(endpoint, options).await,
            None => Self::launch(options).await,
        }
    }

    async fn connect(endpoint: &str, options: &BrowserOptions) -> Result<Self, BrowserError> {
        let ws_url = if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
            endpoint.to_string()
        } else {
            let http = http_client(options.startup_timeout)?;
            wait_for_ws_url(&http, endpoint, options.startup_timeout).await?
        };
        let client = CdpClient::connect(&ws_url, options.command_timeout).await?;
        tracing::info!(endpoint, "attached to running browser");

        Ok(Self {
            client: Arc::new(client),
            ws_url,
            command_timeout: options.command_timeout,
            child: None,
            user_data_dir: None,
        })
    }

    async fn launch(options: &BrowserOptions) -> Result<Self, BrowserError> {
        let user_data_dir = std::env::temp_dir().join(format!(
            "gmaps-chrome-{}-{}",
            std::process::id(),
            PROFILE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        // A stale port file from an earlier run would point at a dead browser.
        remove_data_dir(&user_data_dir).await;

        let mut child = Command::new(&options.chrome_path)
            .args(chrome_args(options, &user_data_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BrowserError::Launch {
                path: options.chrome_path.clone(),
                source,
            })?;

        tracing::info!(
            path = %options.chrome_path,
            port = options.debug_port,
            headless = options.headless,
            "launched browser"
        );

        let attached = async {
            let ws_url =
                wait_for_active_port(&mut child, &user_data_dir, options.startup_timeout).await?;
            tracing::debug!(ws_url = %ws_url, "browser DevTools ready");
            let client = CdpClient::connect(&ws_url, options.command_timeout).await?;
            Ok::<_, BrowserError>((ws_url, client))
        }
        .await;

        match attached {
            Ok((ws_url, client)) => Ok(Self {
                client: Arc::new(client),
                ws_url,
                command_timeout: options.command_timeout,
                child: Some(child),
                user_data_dir: Some(user_data_dir),
            }),
            Err(e) => {
                if let Err(kill) = child.kill().await {
                    tracing::warn!(error = %kill, "failed to kill browser after startup failure");
                }
                remove_data_dir(&user_data_dir).await;
                Err(e)
            }
        }
    }

    /// Open a blank page in a fresh browser context.
    ///
    /// # Errors
    ///
    /// Fails if the context or target cannot be created or attached.
    pub async fn new_page(&self, options: &PageOptions) -> Result<PageSession, BrowserError> {
        let context = self
            .client
            .send(
                "Target.createBrowserContext",
                json!({ "disposeOnDetach": true }),
            )
            .await?;
        let context_id = string_field(&context, "browserContextId")?;

        let created = self
            .client
            .send(
                "Target.createTarget",
                json!({ "url": "about:blank", "browserContextId": context_id }),
            )
            .await;
        let target_id = match created.and_then(|t| string_field(&t, "targetId")) {
            Ok(id) => id,
            Err(e) => {
                self.dispose_context(&context_id).await;
                return Err(e);
            }
        };

        let page = match page_ws_url(&self.ws_url, &target_id) {
            Ok(url) => CdpPage::attach(&url, options, self.command_timeout).await,
            Err(e) => Err(e),
        };
        match page {
            Ok(page) => {
                tracing::debug!(target_id = %target_id, context_id = %context_id, "opened page");
                Ok(PageSession::new(
                    page,
                    Arc::clone(&self.client),
                    context_id,
                    target_id,
                ))
            }
            Err(e) => {
                self.dispose_context(&context_id).await;
                Err(e)
            }
        }
    }

    async fn dispose_context(&self, context_id: &str) {
        if let Err(e) = self
            .client
            .send(
                "Target.disposeBrowserContext",
                json!({ "browserContextId": context_id }),
            )
            .await
        {
            tracing::warn!(context_id, error = %e, "failed to dispose browser context");
        }
    }

    /// Shut down. A launched browser is closed and its profile removed; an
    /// attached one is only disconnected.
    pub async fn close(mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Err(e) = self.client.send("Browser.close", json!({})).await {
            tracing::debug!(error = %e, "Browser.close failed, killing process");
        }
        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "browser exited"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to wait for browser exit"),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill browser");
                }
            }
        }

        if let Some(dir) = self.user_data_dir.take() {
            remove_data_dir(&dir).await;
        }
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, BrowserError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol {
            detail: format!("response has no {field}"),
        })
}

async fn remove_data_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %dir.display(), error = %e, "failed to remove browser profile");
        }
    }
}
