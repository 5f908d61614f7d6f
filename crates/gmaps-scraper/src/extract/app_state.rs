use std::sync::LazyLock;

use gmaps_core::{Coordinates, PlaceDetails};
use regex::Regex;
use serde_json::Value;

use super::ExtractError;

static INITIAL_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s);window\.APP_INITIALIZATION_STATE\s*=\s*(.*?);window\.APP_FLAGS")
        .expect("valid regex")
});

const XSSI_PREFIX: &str = ")]}'\n";

/// Marker in the icon URL that precedes the phone number in a place blob.
const PHONE_ICON_MARKER: &str = "call_googblue";

/// The raw JSON assigned to `window.APP_INITIALIZATION_STATE`.
///
/// # Errors
///
/// [`ExtractError::StateNotFound`] when the assignment is absent and
/// [`ExtractError::NotJson`] when it does not start with `[` or `{`.
pub fn extract_initial_json(html: &str) -> Result<&str, ExtractError> {
    let raw = INITIAL_STATE_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .ok_or(ExtractError::StateNotFound)?;

    if raw.trim_start().starts_with(['[', '{']) {
        Ok(raw)
    } else {
        Err(ExtractError::NotJson)
    }
}

/// Locate the place data blob inside the initial state.
///
/// The blob lives at `[3][6]`, either inline as an array or as a JSON string.
/// String payloads may carry the `)]}'` anti-XSSI prefix; either way the blob
/// is element `[6]` of the decoded string, or failing that the first large
/// nested array found by a shallow scan.
///
/// # Errors
///
/// Returns [`ExtractError`] when the state cannot be decoded or has none of
/// the known shapes.
pub fn parse_data_blob(json_str: &str) -> Result<Value, ExtractError> {
    let state: Value = serde_json::from_str(json_str)?;
    let slot = state
        .pointer("/3/6")
        .ok_or(ExtractError::UnexpectedShape("no [3][6] entry"))?;

    let payload = match slot {
        Value::Array(_) => return Ok(slot.clone()),
        Value::String(s) => s,
        _ => return Err(ExtractError::UnexpectedShape("[3][6] is neither array nor string")),
    };

    let inner_json = if let Some(rest) = payload.strip_prefix(XSSI_PREFIX) {
        rest
    } else {
        let trimmed = payload.trim();
        if !trimmed.starts_with(['[', '{']) {
            return Err(ExtractError::UnexpectedShape("[3][6] string is not JSON"));
        }
        trimmed
    };

    let inner: Value = serde_json::from_str(inner_json)?;
    let Value::Array(items) = inner else {
        return Err(ExtractError::UnexpectedShape("inner state is not an array"));
    };

    match items.get(6) {
        Some(blob @ Value::Array(_)) => Ok(blob.clone()),
        _ => scan_for_data_blob(&items)
            .cloned()
            .ok_or(ExtractError::UnexpectedShape("no data blob in inner state")),
    }
}

/// First array with at least ten entries of which at least three are nested
/// arrays or objects.
fn scan_for_data_blob(items: &[Value]) -> Option<&Value> {
    items.iter().find(|item| {
        item.as_array().is_some_and(|entries| {
            entries.len() >= 10
                && entries
                    .iter()
                    .filter(|e| e.is_array() || e.is_object())
                    .count()
                    >= 3
        })
    })
}

/// Extract place details from a place page's HTML.
///
/// Returns `None` when the initial state is missing, malformed, or yields no
/// fields at all; the reason is logged at debug level.
#[must_use]
pub fn extract_place_data(html: &str, link: &str) -> Option<PlaceDetails> {
    let blob = match extract_initial_json(html).and_then(parse_data_blob) {
        Ok(blob) => blob,
        Err(e) => {
            tracing::debug!(link, error = %e, "no usable initial state");
            return None;
        }
    };

    let details = details_from_blob(&blob, link);
    if details.is_empty() {
        tracing::debug!(link, "initial state blob had no known fields");
        return None;
    }
    Some(details)
}

fn details_from_blob(blob: &Value, link: &str) -> PlaceDetails {
    let string_at = |path: &str| {
        blob.pointer(path)
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    let coordinates = match (
        blob.pointer("/9/2").and_then(Value::as_f64),
        blob.pointer("/9/3").and_then(Value::as_f64),
    ) {
        (Some(latitude), Some(longitude)) => Some(Coordinates {
            latitude,
            longitude,
        }),
        _ => None,
    };

    let address = blob
        .pointer("/2")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(Value::as_str)
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|a| !a.is_empty());

    let categories = blob
        .pointer("/13")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PlaceDetails {
        link: link.to_string(),
        name: string_at("/11"),
        place_id: string_at("/10"),
        coordinates,
        address,
        rating: blob.pointer("/4/7").and_then(Value::as_f64),
        reviews_count: blob.pointer("/4/8").and_then(Value::as_u64),
        categories,
        website: string_at("/7/0"),
        phone: find_phone(blob),
        thumbnail: string_at("/14/0/0/6/0"),
    }
}

/// Depth-first search for `[icon_url, phone_text, ..]` where the icon URL
/// carries the phone marker.
fn find_phone(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => {
            if let [Value::String(icon), Value::String(text), ..] = items.as_slice() {
                if icon.contains(PHONE_ICON_MARKER) {
                    if let Some(digits) = super::digits_only(text) {
                        return Some(digits);
                    }
                }
            }
            items.iter().find_map(find_phone)
        }
        Value::Object(map) => map.values().find_map(find_phone),
        _ => None,
    }
}
