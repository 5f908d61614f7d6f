use std::sync::LazyLock;
use std::time::Duration;

use gmaps_core::PlaceDetails;
use regex::Regex;

use crate::page::{bounded, Element, PageSurface};

static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[.,]\d+|\d+)").expect("valid regex"));
static REVIEWS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\d.,]+)\s*review").expect("valid regex"));

/// Only the first few external anchors are considered as a website guess.
const WEBSITE_FALLBACK_LIMIT: usize = 20;

/// Strip everything but ASCII digits. `None` if no digits remain.
#[must_use]
pub fn digits_only(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    (!digits.is_empty()).then_some(digits)
}

/// Star rating from an aria label such as `"4.5 stars"` or `"4,5 stars"`.
#[must_use]
pub fn parse_rating_label(label: &str) -> Option<f64> {
    if !label.to_lowercase().contains("star") {
        return None;
    }
    let raw = RATING_RE.captures(label)?.get(1)?.as_str().replace(',', ".");
    raw.parse().ok()
}

/// Review count from an aria label such as `"1,234 reviews"`. Thousands
/// separators of either style are dropped.
#[must_use]
pub fn parse_reviews_label(label: &str) -> Option<u64> {
    let raw = REVIEWS_RE.captures(label)?.get(1)?.as_str().replace([',', '.'], "");
    raw.parse().ok()
}

fn first_text(elements: &[Element]) -> Option<String> {
    elements
        .first()
        .map(|e| e.text.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn fallback_website(anchors: &[Element]) -> Option<String> {
    anchors
        .iter()
        .take(WEBSITE_FALLBACK_LIMIT)
        .filter_map(|a| a.href.as_deref())
        .find(|href| !href.contains("google.com") && !href.contains("maps"))
        .map(|href| href.trim().to_string())
}

/// Read place details from the rendered place page.
///
/// Each field is looked up independently; a failing or timed-out query only
/// loses that field. Returns `None` when no field could be read.
pub async fn extract_place_data_dom(
    page: &dyn PageSurface,
    link: &str,
    query_timeout: Duration,
) -> Option<PlaceDetails> {
    let query = |selector: &'static str| async move {
        match bounded("dom query", query_timeout, page.query_selector_all(selector, None)).await {
            Ok(elements) => elements,
            Err(e) => {
                tracing::debug!(selector, error = %e, "dom query failed");
                Vec::new()
            }
        }
    };

    let name = first_text(&query("h1").await);

    let mut address = first_text(&query(r#"button[data-item-id="address"]"#).await);
    if address.is_none() {
        address = first_text(&query(r#"div[data-item-id="address"]"#).await);
    }

    let authority = query(r#"a[data-item-id="authority"]"#).await;
    let website = if authority.is_empty() {
        fallback_website(&query(r#"a[href^="http"]"#).await)
    } else {
        authority
            .first()
            .and_then(|a| a.href.as_deref())
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
    };

    let phone = query(r#"button[data-item-id="phone"]"#)
        .await
        .first()
        .and_then(|e| digits_only(&e.text));

    let rating = query(r#"[aria-label*="star"]"#)
        .await
        .iter()
        .filter_map(|e| e.aria_label.as_deref())
        .find_map(parse_rating_label);

    let reviews_count = query(r#"[aria-label*="review"]"#)
        .await
        .iter()
        .filter_map(|e| e.aria_label.as_deref())
        .find_map(parse_reviews_label);

    let details = PlaceDetails {
        link: link.to_string(),
        name,
        address,
        website,
        phone,
        rating,
        reviews_count,
        ..PlaceDetails::default()
    };

    if details.is_empty() {
        tracing::debug!(link, "dom extraction found nothing");
        None
    } else {
        Some(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ElementHandle;

    fn anchor(href: &str) -> Element {
        Element {
            handle: ElementHandle::new(href),
            text: String::new(),
            href: Some(href.to_string()),
            aria_label: None,
        }
    }

    #[test]
    fn rating_accepts_dot_and_comma() {
        assert_eq!(parse_rating_label("4.5 stars"), Some(4.5));
        assert_eq!(parse_rating_label("4,3 stars "), Some(4.3));
        assert_eq!(parse_rating_label("Rated 3.9 out of 5 stars"), Some(3.9));
        assert_eq!(parse_rating_label("5 stars"), Some(5.0));
    }

    #[test]
    fn rating_requires_star_keyword() {
        assert_eq!(parse_rating_label("4,5 Sterne"), None);
        assert_eq!(parse_rating_label("Stars"), None);
    }

    #[test]
    fn reviews_drop_thousands_separators() {
        assert_eq!(parse_reviews_label("1,234 reviews"), Some(1234));
        assert_eq!(parse_reviews_label("2.345 Reviews"), Some(2345));
        assert_eq!(parse_reviews_label("87 review"), Some(87));
        assert_eq!(parse_reviews_label("no reviews yet"), None);
    }

    #[test]
    fn digits_only_strips_formatting() {
        assert_eq!(digits_only("+49 (221) 12-34").as_deref(), Some("492211234"));
        assert_eq!(digits_only("call"), None);
    }

    #[test]
    fn fallback_website_skips_google_links() {
        let anchors = [
            anchor("https://www.google.com/search?q=x"),
            anchor("https://maps.example/"),
            anchor(" https://cafe.example/ "),
        ];
        assert_eq!(fallback_website(&anchors).as_deref(), Some("https://cafe.example/"));
    }

    #[test]
    fn fallback_website_looks_at_first_twenty_only() {
        let mut anchors: Vec<_> = (0..WEBSITE_FALLBACK_LIMIT)
            .map(|i| anchor(&format!("https://www.google.com/{i}")))
            .collect();
        anchors.push(anchor("https://late.example/"));
        assert_eq!(fallback_website(&anchors), None);
    }
}
