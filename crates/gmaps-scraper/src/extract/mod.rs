//! Place detail extraction.
//!
//! The preferred source is the `APP_INITIALIZATION_STATE` blob embedded in
//! the place page HTML ([`extract_place_data`]). When that is missing or has
//! an unexpected shape, [`extract_place_data_dom`] reads the rendered page.

mod app_state;
mod dom;

pub use app_state::{extract_initial_json, extract_place_data, parse_data_blob};
pub use dom::{digits_only, extract_place_data_dom, parse_rating_label, parse_reviews_label};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("APP_INITIALIZATION_STATE not found in page")]
    StateNotFound,

    #[error("initial state is not JSON")]
    NotJson,

    #[error("failed to decode initial state: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected initial state shape: {0}")]
    UnexpectedShape(&'static str),
}
