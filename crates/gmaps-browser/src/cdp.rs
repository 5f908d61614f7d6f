//! Chrome DevTools Protocol WebSocket client.
//!
//! Commands carry auto-incrementing ids and are matched to responses by a
//! background reader task. Messages without an id are events and are queued
//! on a channel for whoever owns the client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::BrowserError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResponse>>>>;

#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// e.g. `"Network.requestWillBeSent"`.
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, serde::Serialize)]
struct CdpCommand<'a> {
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Clone)]
pub struct CdpResponse {
    pub id: u64,
    pub result: Option<Value>,
    pub error: Option<CdpResponseError>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CdpResponseError {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// One decoded inbound message.
#[derive(Debug, Clone)]
pub enum Inbound {
    Response(CdpResponse),
    Event(CdpEvent),
}

// ---------------------------------------------------------------------------
// CdpClient
// ---------------------------------------------------------------------------

/// WebSocket connection to one DevTools target (the browser or a page).
pub struct CdpClient {
    next_id: AtomicU64,
    pending: Pending,
    writer: Mutex<WsSink>,
    events: Mutex<mpsc::UnboundedReceiver<CdpEvent>>,
    command_timeout: Duration,
    reader: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to a DevTools WebSocket such as
    /// `ws://127.0.0.1:9222/devtools/page/<target>`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::ConnectionFailed`] if the handshake fails.
    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self, BrowserError> {
        tracing::debug!(url = ws_url, "connecting to DevTools websocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| BrowserError::ConnectionFailed {
                url: ws_url.to_string(),
                reason: e.to_string(),
            })?;

        let (writer, reader) = ws_stream.split();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(Self::read_loop(reader, Arc::clone(&pending), event_tx));

        Ok(Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            events: Mutex::new(event_rx),
            command_timeout,
            reader,
        })
    }

    /// Send a command using the client's default timeout.
    ///
    /// # Errors
    ///
    /// See [`CdpClient::send_with_timeout`].
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.send_with_timeout(method, params, self.command_timeout)
            .await
    }

    /// Send a command and wait for its result.
    ///
    /// # Errors
    ///
    /// [`BrowserError::Timeout`] if no response arrives in time,
    /// [`BrowserError::CdpError`] if the browser rejects the command, and
    /// [`BrowserError::Protocol`] if the connection is gone.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&CdpCommand { id, method, params }).map_err(|e| {
            BrowserError::Protocol {
                detail: format!("failed to serialize command: {e}"),
            }
        })?;

        tracing::trace!(id, method, "sending CDP command");

        // Register before sending so a fast response cannot be missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let sent = self
            .writer
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(BrowserError::Protocol {
                detail: format!("failed to send websocket message: {e}"),
            });
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(BrowserError::Protocol {
                    detail: "response channel closed unexpectedly".to_string(),
                })
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(BrowserError::Timeout {
                    method: method.to_string(),
                    duration: timeout,
                });
            }
        };

        if let Some(err) = response.error {
            return Err(BrowserError::CdpError {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// `<Domain>.enable`; most domains emit no events until enabled.
    ///
    /// # Errors
    ///
    /// See [`CdpClient::send`].
    pub async fn enable_domain(&self, domain: &str) -> Result<(), BrowserError> {
        self.send(&format!("{domain}.enable"), serde_json::json!({}))
            .await?;
        Ok(())
    }

    /// Wait up to `timeout` for the next event. `Ok(None)` means the wait
    /// expired.
    ///
    /// # Errors
    ///
    /// [`BrowserError::Protocol`] once the connection has closed.
    pub async fn next_event(&self, timeout: Duration) -> Result<Option<CdpEvent>, BrowserError> {
        let mut events = self.events.lock().await;
        match tokio::time::timeout(timeout, events.recv()).await {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => Err(BrowserError::Protocol {
                detail: "websocket closed".to_string(),
            }),
            Err(_) => Ok(None),
        }
    }

    /// Every event already queued, without waiting.
    pub async fn drain_events(&self) -> Vec<CdpEvent> {
        let mut events = self.events.lock().await;
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    async fn read_loop(
        mut reader: SplitStream<WsStream>,
        pending: Pending,
        event_tx: mpsc::UnboundedSender<CdpEvent>,
    ) {
        while let Some(msg) = reader.next().await {
            let text = match msg {
                Ok(Message::Text(t)) => t.as_str().to_owned(),
                Ok(Message::Binary(b)) => match String::from_utf8(b.to_vec()) {
                    Ok(s) => s,
                    Err(_) => continue,
                },
                Ok(Message::Close(_)) => {
                    tracing::debug!("DevTools websocket closed by remote");
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "DevTools websocket read error, stopping reader");
                    break;
                }
            };

            let json: Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse CDP message as JSON");
                    continue;
                }
            };

            match parse_inbound(&json) {
                Some(Inbound::Response(response)) => {
                    if let Some(tx) = pending.lock().await.remove(&response.id) {
                        let _ = tx.send(response);
                    } else {
                        tracing::debug!(id = response.id, "response for unknown command id");
                    }
                }
                Some(Inbound::Event(event)) => {
                    let _ = event_tx.send(event);
                }
                None => {}
            }
        }

        // Fail every command still waiting so callers do not sit out their
        // full timeout.
        for (id, tx) in pending.lock().await.drain() {
            let _ = tx.send(CdpResponse {
                id,
                result: None,
                error: Some(CdpResponseError {
                    code: -1,
                    message: "websocket connection closed".to_string(),
                    data: None,
                }),
            });
        }
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

// ---------------------------------------------------------------------------
// Message parsing
// ---------------------------------------------------------------------------

/// Classify a decoded message: an `id` marks a response, otherwise a
/// `method` marks an event.
#[must_use]
pub fn parse_inbound(json: &Value) -> Option<Inbound> {
    if let Some(id) = json.get("id").and_then(Value::as_u64) {
        return Some(Inbound::Response(CdpResponse {
            id,
            result: json.get("result").cloned(),
            error: json
                .get("error")
                .and_then(|e| serde_json::from_value(e.clone()).ok()),
        }));
    }
    let method = json.get("method")?.as_str()?.to_string();
    let params = json.get("params").cloned().unwrap_or(Value::Null);
    Some(Inbound::Event(CdpEvent { method, params }))
}
