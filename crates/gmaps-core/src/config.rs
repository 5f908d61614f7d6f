use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Desktop Chrome user agent sent when `GMAPS_USER_AGENT` is not set.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u16 = |var: &str, default: &str| -> Result<u16, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u16>().map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => parse_flag(&raw).ok_or_else(|| {
                invalid(var, format!("expected true/false, got \"{raw}\""))
            }),
        }
    };

    let log_level = or_default("GMAPS_LOG_LEVEL", "info");
    let debug_dir = lookup("GMAPS_DEBUG_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map_or_else(std::env::temp_dir, PathBuf::from);
    let debug_prefix = or_default("GMAPS_DEBUG_PREFIX", "maps_debug");
    let cdp_endpoint = lookup("GMAPS_CDP_ENDPOINT")
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty());
    let chrome_path = or_default("GMAPS_CHROME_PATH", "chromium");
    let chrome_debug_port = parse_u16("GMAPS_CHROME_DEBUG_PORT", "0")?;
    let browser_startup_timeout_secs = parse_u64("GMAPS_BROWSER_STARTUP_TIMEOUT_SECS", "15")?;
    let user_agent = or_default("GMAPS_USER_AGENT", DEFAULT_USER_AGENT);

    let navigation_timeout_secs = parse_u64("GMAPS_NAVIGATION_TIMEOUT_SECS", "30")?;
    let post_navigation_delay_ms = parse_u64("GMAPS_POST_NAVIGATION_DELAY_MS", "2000")?;
    let consent_timeout_ms = parse_u64("GMAPS_CONSENT_TIMEOUT_MS", "3000")?;
    let click_timeout_ms = parse_u64("GMAPS_CLICK_TIMEOUT_MS", "5000")?;
    let network_idle_timeout_ms = parse_u64("GMAPS_NETWORK_IDLE_TIMEOUT_MS", "8000")?;
    let feed_wait_ms = parse_u64("GMAPS_FEED_WAIT_MS", "25000")?;
    let scroll_pause_ms = parse_u64("GMAPS_SCROLL_PAUSE_MS", "1500")?;
    let scroll_delta_px = parse_u32("GMAPS_SCROLL_DELTA_PX", "3000")?;
    let max_scroll_steps = parse_u32("GMAPS_MAX_SCROLL_STEPS", "20")?;
    let stale_scroll_limit = parse_u32("GMAPS_STALE_SCROLL_LIMIT", "2")?;
    let detail_delay_ms = parse_u64("GMAPS_DETAIL_DELAY_MS", "500")?;

    if stale_scroll_limit == 0 {
        return Err(invalid(
            "GMAPS_STALE_SCROLL_LIMIT",
            "must be at least 1".to_string(),
        ));
    }

    let consent_case_sensitive = parse_bool("GMAPS_CONSENT_CASE_SENSITIVE", false)?;
    let consent_collapse_whitespace = parse_bool("GMAPS_CONSENT_COLLAPSE_WHITESPACE", true)?;

    Ok(AppConfig {
        log_level,
        debug_dir,
        debug_prefix,
        cdp_endpoint,
        chrome_path,
        chrome_debug_port,
        browser_startup_timeout_secs,
        user_agent,
        navigation_timeout_secs,
        post_navigation_delay_ms,
        consent_timeout_ms,
        click_timeout_ms,
        network_idle_timeout_ms,
        feed_wait_ms,
        scroll_pause_ms,
        scroll_delta_px,
        max_scroll_steps,
        stale_scroll_limit,
        detail_delay_ms,
        consent_case_sensitive,
        consent_collapse_whitespace,
    })
}

/// Parse a boolean flag. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
