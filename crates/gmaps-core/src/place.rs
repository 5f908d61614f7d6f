//! Place detail records produced by a scrape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Details of one map place.
///
/// Only `link` is always present; everything else is best-effort and omitted
/// from JSON output when it could not be extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
    /// The place page URL the details were read from.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Digits only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl PlaceDetails {
    /// `true` when nothing beyond the link was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.place_id.is_none()
            && self.coordinates.is_none()
            && self.address.is_none()
            && self.rating.is_none()
            && self.reviews_count.is_none()
            && self.categories.is_empty()
            && self.website.is_none()
            && self.phone.is_none()
            && self.thumbnail.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_omitted_from_json() {
        let place = PlaceDetails {
            link: "https://www.google.com/maps/place/A".to_string(),
            name: Some("A".to_string()),
            ..PlaceDetails::default()
        };
        let json = serde_json::to_value(&place).unwrap();
        assert_eq!(json["name"], "A");
        assert!(json.get("phone").is_none());
        assert!(json.get("categories").is_none());
    }

    #[test]
    fn is_empty_only_when_no_detail_fields() {
        let mut place = PlaceDetails {
            link: "https://www.google.com/maps/place/A".to_string(),
            ..PlaceDetails::default()
        };
        assert!(place.is_empty());
        place.rating = Some(4.5);
        assert!(!place.is_empty());
    }
}
