//! Log Stream Relay: mirrors the server's SSE log feed while an analysis runs.
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use attendance_core::{LogCategory, LogEvent};
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use crate::api::endpoint;
use crate::{ApiError, ClientSettings};

const HEARTBEAT: &str = "heartbeat";
pub const CONNECTED_MESSAGE: &str = "Log stream connected";

/// Turns one SSE `data` payload into a user-facing event.
///
/// Heartbeats and empty messages yield `None`. Payloads that are not a JSON
/// value with fields (plain text, `null`) are shown verbatim when they contain
/// anything besides whitespace.
pub fn parse_payload(raw: &str) -> Option<LogEvent> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => {
            let kind = fields.get("type").and_then(Value::as_str);
            if kind == Some(HEARTBEAT) {
                return None;
            }
            let message = fields.get("message").and_then(message_text)?;
            let category = kind.map(LogCategory::from).unwrap_or_default();
            Some(LogEvent::new(category, message))
        }
        // Scalars and arrays have no fields, so there is no message to show.
        Ok(Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_)) => None,
        Ok(Value::Null) | Err(_) if raw.trim().is_empty() => None,
        Ok(Value::Null) | Err(_) => Some(LogEvent::new(LogCategory::Default, raw)),
    }
}

/// Text of a `message` field, or `None` when it is blank, zero or false.
fn message_text(message: &Value) -> Option<String> {
    match message {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.as_f64() != Some(0.0) => Some(number.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Array(_) | Value::Object(_) => Some(message.to_string()),
        _ => None,
    }
}

/// Incremental `text/event-stream` decoder yielding the `data` of each event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds a chunk and returns the payloads of all events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(end) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if let Some(payload) = self.accept_line(line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flushes whatever the server sent before closing the connection.
    pub fn finish(mut self) -> Option<String> {
        if !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            let line = line.trim_end_matches('\r');
            if let Some(payload) = self.accept_line(line) {
                return Some(payload);
            }
        }
        self.dispatch()
    }

    fn accept_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

/// Identifies one connection opened by [`LogStreamRelay::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

/// Filtered log events of one relay connection, in delivery order.
///
/// Ends when the connection is closed, fails, or the server hangs up.
pub struct LogEventStream {
    id: StreamId,
    rx: mpsc::UnboundedReceiver<LogEvent>,
}

impl LogEventStream {
    pub fn id(&self) -> StreamId {
        self.id
    }

    pub async fn next_event(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }
}

impl Stream for LogEventStream {
    type Item = LogEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<LogEvent>> {
        self.rx.poll_recv(cx)
    }
}

struct ActiveStream {
    id: StreamId,
    task: JoinHandle<()>,
}

/// Holds at most one open log stream connection.
pub struct LogStreamRelay {
    client: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
    active: Mutex<Option<ActiveStream>>,
}

impl LogStreamRelay {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        // No overall timeout: the connection stays open for the whole run.
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        let url = endpoint(&settings.base()?, &["api", "log-stream"])?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(0),
            active: Mutex::new(None),
        })
    }

    /// Opens a new connection after the previous one has been torn down.
    ///
    /// When this returns, the previous relay task has finished and dropped its
    /// response, so its [`LogEventStream`] has ended.
    pub async fn start(&self) -> LogEventStream {
        let previous = self.lock().take();
        if let Some(previous) = previous {
            engine_debug!("Closing previous log stream before reconnecting");
            previous.task.abort();
            let _ = previous.task.await;
        }

        let id = StreamId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(relay(self.client.clone(), self.url.clone(), tx));
        let raced = self.lock().replace(ActiveStream { id, task });
        if let Some(raced) = raced {
            // Another start slipped in while we waited.
            raced.task.abort();
        }
        LogEventStream { id, rx }
    }

    /// Closes the connection if one is open. Safe to call at any time.
    pub fn stop(&self) {
        if let Some(active) = self.lock().take() {
            active.task.abort();
            engine_debug!("Log stream closed");
        }
    }

    /// Closes the connection only if it is still the one `id` opened.
    ///
    /// Returns false when a later `start` already replaced it.
    pub fn stop_stream(&self, id: StreamId) -> bool {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|current| current.id == id) {
            if let Some(current) = active.take() {
                current.task.abort();
                engine_debug!("Log stream closed");
            }
            return true;
        }
        false
    }

    /// True while a started connection has not been stopped or ended.
    pub fn is_open(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveStream>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LogStreamRelay {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn relay(client: reqwest::Client, url: Url, tx: mpsc::UnboundedSender<LogEvent>) {
    let response = match client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            engine_warn!("Log stream connection failed: {}", err);
            return;
        }
    };
    if !response.status().is_success() {
        engine_warn!("Log stream refused with status {}", response.status());
        return;
    }

    engine_info!("Log stream connected");
    if tx.send(LogEvent::info(CONNECTED_MESSAGE)).is_err() {
        return;
    }

    let mut decoder = SseDecoder::default();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                engine_warn!("Log stream error: {}", err);
                return;
            }
        };
        for payload in decoder.push(&chunk) {
            if let Some(event) = parse_payload(&payload) {
                if tx.send(event).is_err() {
                    return;
                }
            }
        }
    }
    if let Some(event) = decoder.finish().as_deref().and_then(parse_payload) {
        let _ = tx.send(event);
    }
    engine_debug!("Log stream ended by server");
}
