//! Google Maps search scraping core.
//!
//! Drives one browser page (anything implementing [`PageSurface`]) through
//! consent handling, three-tier place-link collection and per-link detail
//! extraction. Debug screenshots and HTML snapshots are written when the
//! results feed is missing or a scrape ends with zero links.

pub mod config;
pub mod consent;
pub mod debug;
pub mod error;
pub mod extract;
pub mod links;
pub mod orchestrator;
pub mod page;
pub mod search;

pub use config::{ConsentConfig, LinkConfig, ScrapeConfig, TextMatch};
pub use consent::{ConsentAction, ConsentOutcome, ConsentResolver, ConsentVariant};
pub use debug::{ArtifactPaths, DebugArtifact, DebugReason, DebugRecorder};
pub use error::{PageError, ScrapeError};
pub use links::{CollectedLinks, LinkCollector, PlaceLink, Tier};
pub use orchestrator::{ScrapeStage, Scraper};
pub use page::{Element, ElementHandle, PageSurface};
pub use search::search_url;
