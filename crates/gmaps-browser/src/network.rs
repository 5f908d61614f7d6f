//! Network quiescence tracking from `Network.*` events.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

/// No requests in flight for this long counts as idle.
pub const QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Counts in-flight requests and remembers when the last one started or
/// ended.
#[derive(Debug, Clone)]
pub struct NetworkTracker {
    inflight: HashSet<String>,
    last_activity: Instant,
}

impl NetworkTracker {
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            inflight: HashSet::new(),
            last_activity: now,
        }
    }

    /// Forget everything, e.g. when a new document starts loading.
    pub fn reset(&mut self, now: Instant) {
        self.inflight.clear();
        self.last_activity = now;
    }

    /// Feed one CDP event. Events outside the `Network` domain are ignored.
    pub fn observe(&mut self, method: &str, params: &Value, now: Instant) {
        let Some(request_id) = params.get("requestId").and_then(Value::as_str) else {
            return;
        };
        match method {
            "Network.requestWillBeSent" => {
                self.inflight.insert(request_id.to_string());
                self.last_activity = now;
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                if self.inflight.remove(request_id) {
                    self.last_activity = now;
                }
            }
            _ => {}
        }
    }

    /// How much longer the page must stay quiet before it counts as idle.
    /// `None` while requests are in flight.
    #[must_use]
    pub fn quiet_remaining(&self, now: Instant, quiet: Duration) -> Option<Duration> {
        if !self.inflight.is_empty() {
            return None;
        }
        Some(quiet.saturating_sub(now.saturating_duration_since(self.last_activity)))
    }
}
