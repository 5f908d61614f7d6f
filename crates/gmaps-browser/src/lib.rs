//! Chrome DevTools Protocol adapter for the scraper's [`PageSurface`].
//!
//! - **`cdp`**: WebSocket client with command/response correlation and an
//!   event channel.
//! - **`launch`**: start or attach to Chrome and open isolated pages.
//! - **`page`**: [`CdpPage`], the `PageSurface` implementation.
//! - **`session`**: [`PageSession`], one browser context per scrape, disposed
//!   on every exit path.
//!
//! [`PageSurface`]: gmaps_scraper::PageSurface

pub mod cdp;
pub mod error;
pub mod launch;
pub mod network;
pub mod page;
pub mod session;

pub use cdp::{CdpClient, CdpEvent};
pub use error::BrowserError;
pub use launch::{discover_ws_url, page_ws_url, Browser, BrowserOptions, PageOptions};
pub use network::NetworkTracker;
pub use page::CdpPage;
pub use session::PageSession;
