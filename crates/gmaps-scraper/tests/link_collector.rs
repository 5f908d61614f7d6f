//! Integration tests for the three-tier `LinkCollector`.

mod common;

use gmaps_scraper::{LinkCollector, PlaceLink, Tier};

use common::{fast_config, place_url, place_urls, Call, FakePage, ScratchDir};

fn collector(dir: &ScratchDir) -> LinkCollector {
    LinkCollector::new(fast_config().links, dir.recorder())
}

fn urls(links: &[PlaceLink]) -> Vec<String> {
    links.iter().map(|l| l.as_str().to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tier 1 – feed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn feed_links_are_collected_across_scroll_steps_in_order() {
    let dir = ScratchDir::new("feed-order");
    let page = FakePage::new().with_feed(vec![
        place_urls(0..3),
        place_urls(3..5),
        // Re-rendered rows repeat earlier anchors.
        vec![place_url(1), place_url(5)],
    ]);

    let collected = collector(&dir).collect(&page, None).await;

    assert_eq!(collected.tier, Some(Tier::Feed));
    assert_eq!(urls(&collected.links), place_urls(0..6));
    assert!(dir.files().is_empty(), "no debug capture expected");
}

#[tokio::test]
async fn feed_scroll_stops_after_two_stale_steps() {
    let dir = ScratchDir::new("feed-stale");
    let page = FakePage::new().with_feed(vec![place_urls(0..4)]);

    let collected = collector(&dir).collect(&page, None).await;

    assert_eq!(collected.links.len(), 4);
    assert_eq!(page.wheel_count(), 2);
    assert!(page.calls().iter().all(|c| !matches!(c, Call::Wheel { scoped: false })));
}

#[tokio::test]
async fn feed_scroll_respects_max_steps() {
    let dir = ScratchDir::new("feed-max");
    let batches: Vec<_> = (0..50).map(|i| vec![place_url(i)]).collect();
    let page = FakePage::new().with_feed(batches);
    let mut config = fast_config().links;
    config.max_scroll_steps = 5;

    let collected = LinkCollector::new(config, dir.recorder())
        .collect(&page, None)
        .await;

    assert_eq!(page.wheel_count(), 5);
    assert_eq!(urls(&collected.links), place_urls(0..6));
}

#[tokio::test]
async fn cap_reached_mid_scan_stops_without_overshoot() {
    let dir = ScratchDir::new("feed-cap");
    let page = FakePage::new().with_feed(vec![place_urls(0..6), place_urls(6..15)]);

    let collected = collector(&dir).collect(&page, Some(8)).await;

    assert_eq!(urls(&collected.links), place_urls(0..8));
    assert_eq!(page.wheel_count(), 1, "scrolling must stop once the cap is hit");
}

#[tokio::test]
async fn feed_hit_never_runs_later_tiers() {
    let dir = ScratchDir::new("feed-short-circuit");
    let page = FakePage::new()
        .with_feed(vec![place_urls(0..2)])
        .with_document_links(vec![place_urls(10..20)]);

    let collected = collector(&dir).collect(&page, None).await;

    assert_eq!(collected.tier, Some(Tier::Feed));
    assert_eq!(page.count(|c| matches!(c, Call::CurrentUrl)), 0);
    assert_eq!(page.unscoped_link_scans(), 0);
}

#[tokio::test]
async fn repeated_runs_on_static_page_give_identical_order() {
    let dir = ScratchDir::new("feed-stable");
    let build = || FakePage::new().with_feed(vec![place_urls(0..5), place_urls(2..9)]);

    let first = collector(&dir).collect(&build(), None).await;
    let second = collector(&dir).collect(&build(), None).await;

    assert_eq!(first, second);
    let mut deduped = urls(&first.links);
    deduped.dedup();
    assert_eq!(deduped.len(), first.links.len());
}

// ---------------------------------------------------------------------------
// Tier 2 – single place
// ---------------------------------------------------------------------------

#[tokio::test]
async fn place_url_without_feed_yields_that_url_and_no_scrolling() {
    let dir = ScratchDir::new("single-place");
    let place = "https://www.google.com/maps/place/Cafe+Central/@50.9,6.9,17z";
    let page = FakePage::new()
        .with_search_redirect(place)
        .with_document_links(vec![place_urls(0..3)]);
    gmaps_scraper::PageSurface::navigate(
        &page,
        "https://www.google.com/maps/search/?q=cafe",
        std::time::Duration::from_secs(1),
    )
    .await
    .unwrap();

    let collected = collector(&dir).collect(&page, Some(5)).await;

    assert_eq!(collected.tier, Some(Tier::SinglePlace));
    assert_eq!(urls(&collected.links), [place]);
    assert_eq!(page.wheel_count(), 0);
    assert_eq!(page.unscoped_link_scans(), 0, "tier 3 must not run");
    assert_eq!(dir.files_with("feed_not_found").len(), 2);
}

// ---------------------------------------------------------------------------
// Tier 3 – global fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn global_fallback_scrolls_document_body() {
    let dir = ScratchDir::new("global");
    let page = FakePage::new().with_document_links(vec![
        place_urls(0..2),
        vec![place_url(0), place_url(2)],
    ]);

    let collected = collector(&dir).collect(&page, None).await;

    assert_eq!(collected.tier, Some(Tier::GlobalFallback));
    assert_eq!(urls(&collected.links), place_urls(0..3));
    assert!(page.wheel_count() >= 1);
    assert!(page.calls().iter().all(|c| !matches!(c, Call::Wheel { scoped: true })));
}

#[tokio::test]
async fn empty_feed_falls_through_without_feed_capture() {
    let dir = ScratchDir::new("feed-empty");
    let page = FakePage::new()
        .with_feed(Vec::new())
        .with_document_links(vec![place_urls(0..2)]);

    let collected = collector(&dir).collect(&page, None).await;

    assert_eq!(collected.tier, Some(Tier::GlobalFallback));
    assert_eq!(urls(&collected.links), place_urls(0..2));
    assert_eq!(page.count(|c| matches!(c, Call::CurrentUrl)), 1, "tier 2 must run");
    assert!(page.calls().iter().any(|c| matches!(c, Call::Wheel { scoped: true })));
    assert!(
        dir.files_with("feed_not_found").is_empty(),
        "a present feed is not a missing feed: {:?}",
        dir.files()
    );
}

#[tokio::test]
async fn empty_page_yields_no_links_and_one_feed_capture() {
    let dir = ScratchDir::new("empty");
    let page = FakePage::new();

    let collected = collector(&dir).collect(&page, None).await;

    assert!(collected.is_empty());
    assert_eq!(collected.tier, None);
    let captures = dir.files_with("feed_not_found");
    assert_eq!(captures.len(), 2, "expected png + html, got {captures:?}");
    assert!(dir.files_with("zero_results").is_empty());
}

#[tokio::test]
async fn single_tier_can_be_run_directly() {
    let dir = ScratchDir::new("run-tier");
    let page = FakePage::new().with_document_links(vec![place_urls(0..3)]);

    let links = collector(&dir)
        .run_tier(Tier::GlobalFallback, &page, Some(2))
        .await;

    assert_eq!(urls(&links), place_urls(0..2));
    assert_eq!(Tier::ORDER, [Tier::Feed, Tier::SinglePlace, Tier::GlobalFallback]);
}
