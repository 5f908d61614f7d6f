//! Shared configuration and domain types for the Google Maps scraper.

pub mod app_config;
pub mod config;
pub mod place;
pub mod request;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use place::{Coordinates, PlaceDetails};
pub use request::{RequestError, ScrapeRequest};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
