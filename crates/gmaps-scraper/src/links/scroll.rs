use super::set::LinkSet;
use super::{PlaceLink, PLACE_LINK_SELECTOR};
use crate::config::LinkConfig;
use crate::error::PageError;
use crate::page::{bounded, ElementHandle, PageSurface};

/// Scan, then wheel-scroll and re-scan until the cap is reached, the step
/// budget runs out, or `stale_scroll_limit` consecutive steps add nothing.
///
/// With `scope` the wheel events and the anchor scan are confined to that
/// element; without it they target the whole document.
pub(crate) async fn scroll_collect(
    page: &dyn PageSurface,
    scope: Option<&ElementHandle>,
    cap: Option<usize>,
    config: &LinkConfig,
) -> Vec<PlaceLink> {
    let mut set = LinkSet::new(cap);

    if let Err(e) = scan(page, scope, config, &mut set).await {
        tracing::warn!(error = %e, "initial link scan failed");
        return set.into_links();
    }

    let mut steps = 0u32;
    let mut stale = 0u32;
    while !set.is_full() && steps < config.max_scroll_steps && stale < config.stale_scroll_limit {
        steps += 1;

        let wheel = page.wheel(scope, f64::from(config.scroll_delta_px));
        if let Err(e) = bounded("wheel scroll", config.scroll_step_timeout, wheel).await {
            tracing::warn!(step = steps, error = %e, "scroll step failed, continuing");
        }
        tokio::time::sleep(config.scroll_pause).await;

        match scan(page, scope, config, &mut set).await {
            Ok(0) => stale += 1,
            Ok(added) => {
                stale = 0;
                tracing::debug!(step = steps, added, total = set.len(), "scroll step found links");
            }
            Err(e) => {
                tracing::warn!(step = steps, error = %e, "link scan failed, keeping links so far");
                break;
            }
        }
    }

    tracing::debug!(
        steps,
        stale,
        total = set.len(),
        full = set.is_full(),
        "scroll collection finished"
    );
    set.into_links()
}

async fn scan(
    page: &dyn PageSurface,
    scope: Option<&ElementHandle>,
    config: &LinkConfig,
    set: &mut LinkSet,
) -> Result<usize, PageError> {
    let anchors = bounded(
        "link scan",
        config.scroll_step_timeout,
        page.query_selector_all(PLACE_LINK_SELECTOR, scope),
    )
    .await?;
    Ok(set.absorb(&anchors))
}
