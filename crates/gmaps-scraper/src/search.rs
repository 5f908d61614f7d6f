use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

const SEARCH_BASE: &str = "https://www.google.com/maps/search/";

/// Builds the Maps search URL for `query`, with an `hl` interface-language
/// parameter when `lang` is set.
#[must_use]
pub fn search_url(query: &str, lang: Option<&str>) -> String {
    let encoded = utf8_percent_encode(query.trim(), NON_ALPHANUMERIC);
    match lang.map(str::trim).filter(|l| !l.is_empty()) {
        Some(lang) => format!(
            "{SEARCH_BASE}?q={encoded}&hl={}",
            utf8_percent_encode(lang, NON_ALPHANUMERIC)
        ),
        None => format!("{SEARCH_BASE}?q={encoded}"),
    }
}
