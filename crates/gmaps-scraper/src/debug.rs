//! Diagnostic snapshots for failed or empty link collection.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use gmaps_core::AppConfig;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::page::{bounded, PageSurface};

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugReason {
    /// The results feed landmark never appeared.
    FeedNotFound,
    /// Every link collection tier came back empty.
    ZeroResults,
}

impl DebugReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FeedNotFound => "feed_not_found",
            Self::ZeroResults => "zero_results",
        }
    }
}

impl fmt::Display for DebugReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything collected from the page for one capture. Parts the page could
/// not provide are `None`.
#[derive(Debug, Clone)]
pub struct DebugArtifact {
    pub timestamp: NaiveDateTime,
    pub reason: DebugReason,
    pub screenshot: Option<Vec<u8>>,
    pub html: Option<String>,
    pub url: Option<String>,
}

/// Files actually written by one capture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub screenshot: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

impl ArtifactPaths {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.screenshot.is_none() && self.html.is_none()
    }
}

/// Writes `<prefix>_<YYYYMMDD_HHMMSS>_<reason>.{png,html}` into a fixed
/// directory.
///
/// Capture never fails the caller. Existing files are never overwritten: a
/// name collision is reported as a warning and that file is skipped.
#[derive(Debug, Clone)]
pub struct DebugRecorder {
    dir: PathBuf,
    prefix: String,
}

impl DebugRecorder {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(config.debug_dir.clone(), config.debug_prefix.clone())
    }

    /// The file stem shared by both artifacts of one capture.
    #[must_use]
    pub fn stem(&self, reason: DebugReason, timestamp: NaiveDateTime) -> String {
        format!(
            "{}_{}_{}",
            self.prefix,
            timestamp.format(TIMESTAMP_FORMAT),
            reason
        )
    }

    /// Capture the page now, using local wall-clock time.
    pub async fn capture(&self, page: &dyn PageSurface, reason: DebugReason) -> ArtifactPaths {
        self.capture_at(page, reason, chrono::Local::now().naive_local())
            .await
    }

    pub async fn capture_at(
        &self,
        page: &dyn PageSurface,
        reason: DebugReason,
        timestamp: NaiveDateTime,
    ) -> ArtifactPaths {
        let artifact = Self::gather(page, reason, timestamp).await;
        self.persist(&artifact).await
    }

    /// Pull screenshot, HTML and URL from the page. Each part is bounded and
    /// independent of the others.
    pub async fn gather(
        page: &dyn PageSurface,
        reason: DebugReason,
        timestamp: NaiveDateTime,
    ) -> DebugArtifact {
        let url = match bounded("current url", CAPTURE_TIMEOUT, page.current_url()).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(%reason, error = %e, "debug capture: could not read page url");
                None
            }
        };
        let screenshot = match bounded("screenshot", CAPTURE_TIMEOUT, page.screenshot()).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(%reason, error = %e, "debug capture: screenshot failed");
                None
            }
        };
        let html = match bounded("page content", CAPTURE_TIMEOUT, page.content()).await {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::warn!(%reason, error = %e, "debug capture: html snapshot failed");
                None
            }
        };

        DebugArtifact {
            timestamp,
            reason,
            screenshot,
            html,
            url,
        }
    }

    pub async fn persist(&self, artifact: &DebugArtifact) -> ArtifactPaths {
        let stem = self.stem(artifact.reason, artifact.timestamp);
        let mut written = ArtifactPaths::default();

        if let Some(bytes) = &artifact.screenshot {
            let path = self.dir.join(format!("{stem}.png"));
            match write_new(&path, bytes).await {
                Ok(()) => written.screenshot = Some(path),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write debug screenshot");
                }
            }
        }

        if let Some(html) = &artifact.html {
            let path = self.dir.join(format!("{stem}.html"));
            match write_new(&path, html.as_bytes()).await {
                Ok(()) => written.html = Some(path),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to write debug html");
                }
            }
        }

        tracing::info!(
            reason = %artifact.reason,
            url = artifact.url.as_deref().unwrap_or("<unknown>"),
            screenshot = ?written.screenshot,
            html = ?written.html,
            "debug artifacts captured"
        );
        written
    }
}

async fn write_new(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    fill_or_discard(path, file, bytes).await
}

/// Write `bytes` into the freshly created `path`. On failure the partial file
/// is removed so it cannot block a later capture with the same name.
async fn fill_or_discard<W>(path: &Path, mut file: W, bytes: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;
    if written.is_err() {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial debug file");
        }
    }
    written
}
