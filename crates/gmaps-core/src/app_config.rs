use std::path::PathBuf;

/// Runtime configuration for one scraper process.
///
/// Every duration is stored in the unit named by its suffix so the values map
/// one-to-one onto the `GMAPS_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub log_level: String,
    /// Directory that receives debug screenshots and HTML snapshots.
    pub debug_dir: PathBuf,
    pub debug_prefix: String,
    /// DevTools HTTP endpoint of an already running Chrome. When `None` a
    /// browser is launched from `chrome_path`.
    pub cdp_endpoint: Option<String>,
    pub chrome_path: String,
    /// Remote debugging port for a launched browser. `0` lets Chrome pick a
    /// free port.
    pub chrome_debug_port: u16,
    pub browser_startup_timeout_secs: u64,
    pub user_agent: String,
    pub navigation_timeout_secs: u64,
    pub post_navigation_delay_ms: u64,
    pub consent_timeout_ms: u64,
    pub click_timeout_ms: u64,
    pub network_idle_timeout_ms: u64,
    pub feed_wait_ms: u64,
    pub scroll_pause_ms: u64,
    pub scroll_delta_px: u32,
    pub max_scroll_steps: u32,
    pub stale_scroll_limit: u32,
    pub detail_delay_ms: u64,
    pub consent_case_sensitive: bool,
    pub consent_collapse_whitespace: bool,
}
