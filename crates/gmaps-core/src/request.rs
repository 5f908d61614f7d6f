//! Parameters of one scrape job as submitted by the upstream API layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("query must not be empty")]
    EmptyQuery,

    #[error("max_places must be at least 1 when set")]
    ZeroCap,
}

/// One scrape job.
///
/// `lang` is a language tag such as `"de"` or `"en-GB"`. When absent the
/// search URL carries no `hl` parameter and consent handling uses the
/// language-agnostic phrase list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub query: String,
    #[serde(default)]
    pub max_places: Option<usize>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_headless() -> bool {
    true
}

impl ScrapeRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_places: None,
            lang: None,
            headless: true,
        }
    }

    #[must_use]
    pub fn with_max_places(mut self, max_places: usize) -> Self {
        self.max_places = Some(max_places);
        self
    }

    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Checks the request before any browser work starts.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EmptyQuery`] for a blank query and
    /// [`RequestError::ZeroCap`] for `max_places = 0`.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.query.trim().is_empty() {
            return Err(RequestError::EmptyQuery);
        }
        if self.max_places == Some(0) {
            return Err(RequestError::ZeroCap);
        }
        Ok(())
    }

    /// The language tag with surrounding whitespace removed, if non-empty.
    #[must_use]
    pub fn lang_tag(&self) -> Option<&str> {
        self.lang.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}
