use anyhow::Context;
use gmaps_browser::{Browser, BrowserOptions, PageOptions};
use gmaps_core::{AppConfig, PlaceDetails, ScrapeRequest};
use gmaps_scraper::Scraper;

/// Run one scrape and print the places as pretty JSON on stdout.
///
/// The page session and a launched browser are torn down on every exit
/// path, including Ctrl-C.
///
/// # Errors
///
/// Returns an error for an invalid request, a browser that cannot be
/// started, or a failed search navigation. Zero results is not an error.
pub(crate) async fn run(config: &AppConfig, request: &ScrapeRequest) -> anyhow::Result<()> {
    request.validate()?;

    let browser = Browser::start(&BrowserOptions::from_app_config(config, request.headless))
        .await
        .context("failed to start browser")?;

    let result = scrape_in_session(&browser, config, request).await;
    browser.close().await;

    let Some(places) = result? else {
        tracing::warn!("scrape cancelled");
        return Ok(());
    };

    tracing::info!(query = %request.query, count = places.len(), "scrape finished");
    println!("{}", serde_json::to_string_pretty(&places)?);
    Ok(())
}

/// `Ok(None)` when cancelled by Ctrl-C.
async fn scrape_in_session(
    browser: &Browser,
    config: &AppConfig,
    request: &ScrapeRequest,
) -> anyhow::Result<Option<Vec<PlaceDetails>>> {
    let session = browser
        .new_page(&PageOptions::from_app_config(config, request.lang_tag()))
        .await
        .context("failed to open page")?;
    let scraper = Scraper::from_app_config(config);

    let outcome = tokio::select! {
        res = scraper.scrape(session.page(), request) => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "failed to close page session");
    }

    match outcome {
        Some(res) => Ok(Some(res?)),
        None => Ok(None),
    }
}
